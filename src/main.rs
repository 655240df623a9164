/*
    Regolith, small-body exploration simulation
    Copyright (C) 2024 Regolith contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use clap::{ArgGroup, Parser};
use log::{debug, error, info};
use regolith::cosmic::{Asteroid, Dumbbell};
use regolith::io::Archive;
use regolith::mission::{Mission, MissionConfig};
use regolith::shape::write_obj;
use regolith::SimError;
use std::path::{Path, PathBuf};

/// Autonomous small-body exploration, reconstruction, and landing.
///
/// Exit codes: 0 success, 1 unknown asteroid, 2 integrator divergence,
/// 3 archive missing or malformed.
#[derive(Parser, Debug)]
#[command(name = "regolith", version, about)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["control_sim", "reconstruct", "volume", "uncertainty", "state", "landing_refine", "landing"]),
))]
struct Cli {
    /// Per-run archive path (created by --control-sim, read by the rest)
    archive: PathBuf,

    /// Asteroid name: castalia, itokawa, or eros
    name: String,

    /// Run the exploration simulation with the control cost
    #[arg(short = 'c', long)]
    control_sim: bool,

    /// Write reconstruction snapshots as OBJ files into this directory
    #[arg(short = 'r', long, value_name = "DIR")]
    reconstruct: Option<PathBuf>,

    /// Write the mesh volume per tick as CSV
    #[arg(short = 'v', long, value_name = "FILE")]
    volume: Option<PathBuf>,

    /// Write the total uncertainty per tick as CSV
    #[arg(short = 'u', long, value_name = "FILE")]
    uncertainty: Option<PathBuf>,

    /// Write the state trajectory as CSV
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Remesh the landing cone and refine it with narrow-beam ranging
    #[arg(long)]
    landing_refine: bool,

    /// Descend to the surface from the refinement terminal state
    #[arg(short = 'l', long)]
    landing: bool,

    /// Shape model directory containing <name>.obj
    #[arg(long, default_value = "data/shape_model")]
    data_dir: PathBuf,

    /// Override the exploration horizon, in ticks
    #[arg(long)]
    steps: Option<usize>,

    /// Camera follows the spacecraft (plotting collaborators only)
    #[arg(long)]
    move_cam: bool,

    /// Color the mesh by uncertainty (plotting collaborators only)
    #[arg(long)]
    mesh_weight: bool,

    /// Show figures interactively (plotting collaborators only)
    #[arg(long)]
    show: bool,

    /// Image magnification (plotting collaborators only)
    #[arg(short = 'm', long, default_value_t = 4)]
    magnification: u32,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}

fn run(cli: &Cli) -> Result<(), SimError> {
    if cli.move_cam || cli.mesh_weight || cli.show || cli.magnification != 4 {
        debug!("cosmetic flags are forwarded to the plotting collaborators and ignored here");
    }
    let mut cfg = MissionConfig::default();
    if let Some(steps) = cli.steps {
        cfg.explore_steps = steps;
    }

    if cli.control_sim {
        // Fail on a bad name before touching the disk.
        Asteroid::lookup(&cli.name)?;
        let shape_path = cli.data_dir.join(format!("{}.obj", cli.name));
        let asteroid = Asteroid::from_obj(&cli.name, &shape_path)?;
        let archive = Archive::create(&cli.archive)?;
        let mut mission = Mission::new(archive, asteroid, Dumbbell::default(), cfg)?;
        let summary = mission.explore()?;
        info!(
            "run complete: {} ticks, control effort {:.4e}, terminal uncertainty {:.2}",
            summary.ticks, summary.control_effort, summary.total_weight
        );
        return Ok(());
    }
    if cli.landing_refine {
        Asteroid::lookup(&cli.name)?;
        let archive = Archive::open(&cli.archive)?;
        let mut mission = Mission::resume(archive, cfg)?;
        mission.refine()?;
        return Ok(());
    }
    if cli.landing {
        Asteroid::lookup(&cli.name)?;
        let archive = Archive::open(&cli.archive)?;
        let mut mission = Mission::resume(archive, cfg)?;
        mission.land()?;
        return Ok(());
    }

    // Report modes work purely off the archive.
    let archive = Archive::open(&cli.archive)?;
    if let Some(out) = &cli.reconstruct {
        return reconstruct_snapshots(&archive, out);
    }
    if let Some(out) = &cli.volume {
        return volume_report(&archive, out);
    }
    if let Some(out) = &cli.uncertainty {
        return uncertainty_report(&archive, out);
    }
    if let Some(out) = &cli.state {
        return state_report(&archive, out);
    }
    unreachable!("clap enforces exactly one mode");
}

/// Initial, quartile, and final reconstructions as OBJ files.
fn reconstruct_snapshots(archive: &Archive, out_dir: &Path) -> Result<(), SimError> {
    std::fs::create_dir_all(out_dir)?;
    let verts = archive.group("reconstructed_vertex");
    let faces = archive.group("reconstructed_face");
    let keys = verts.keys()?;
    if keys.is_empty() {
        return Err(SimError::Archive("no reconstruction data".into()));
    }
    let picks = [
        0,
        keys.len() / 4,
        keys.len() / 2,
        3 * keys.len() / 4,
        keys.len() - 1,
    ];
    for idx in picks {
        let key = &keys[idx];
        let v: Vec<[f64; 3]> = verts.read(key)?;
        let f: Vec<[usize; 3]> = faces.read(key)?;
        let v: Vec<_> = v
            .iter()
            .map(|r| nalgebra::Vector3::new(r[0], r[1], r[2]))
            .collect();
        let path = out_dir.join(format!("partial_{key}.obj"));
        write_obj(&path, &v, &f)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn volume_report(archive: &Archive, out: &Path) -> Result<(), SimError> {
    let verts = archive.group("reconstructed_vertex");
    let faces = archive.group("reconstructed_face");
    let mut wtr = csv::Writer::from_path(out)?;
    wtr.write_record(["tick", "volume_km3"])?;
    for key in verts.keys()? {
        let v: Vec<[f64; 3]> = verts.read(&key)?;
        let f: Vec<[usize; 3]> = faces.read(&key)?;
        wtr.serialize((key.parse::<i64>().unwrap_or(-1), signed_volume(&v, &f)))?;
    }
    wtr.flush()?;
    info!("volume report written to {}", out.display());
    Ok(())
}

fn uncertainty_report(archive: &Archive, out: &Path) -> Result<(), SimError> {
    let weights = archive.group("reconstructed_weight");
    let mut wtr = csv::Writer::from_path(out)?;
    wtr.write_record(["tick", "total_weight"])?;
    for key in weights.keys()? {
        let w: Vec<f64> = weights.read(&key)?;
        wtr.serialize((key.parse::<i64>().unwrap_or(-1), w.iter().sum::<f64>()))?;
    }
    wtr.flush()?;
    info!("uncertainty report written to {}", out.display());
    Ok(())
}

fn state_report(archive: &Archive, out: &Path) -> Result<(), SimError> {
    let states = archive.group("state");
    let mut wtr = csv::Writer::from_path(out)?;
    let mut header = vec!["tick".to_string()];
    header.extend((0..18).map(|i| format!("x{i}")));
    wtr.write_record(&header)?;
    for key in states.keys()? {
        let x: Vec<f64> = states.read(&key)?;
        let mut row = vec![key.clone()];
        row.extend(x.iter().map(|v| format!("{v:e}")));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    info!("state report written to {}", out.display());
    Ok(())
}

/// Divergence-theorem volume straight off the archived arrays.
fn signed_volume(vertices: &[[f64; 3]], faces: &[[usize; 3]]) -> f64 {
    faces
        .iter()
        .map(|f| {
            let a = vertices[f[0]];
            let b = vertices[f[1]];
            let c = vertices[f[2]];
            a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
                + a[2] * (b[0] * c[1] - b[1] * c[0])
        })
        .sum::<f64>()
        / 6.0
}
