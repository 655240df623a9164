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

//! Wavefront OBJ subset: `v x y z` and `f i j k` lines with 1-based pure
//! vertex indices. Everything else is ignored.

use crate::errors::SimError;
use log::debug;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn read_obj<P: AsRef<Path>>(path: P) -> Result<(Vec<Vector3<f64>>, Vec<[usize; 3]>), SimError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => {
                let mut coords = [0.0f64; 3];
                for c in &mut coords {
                    *c = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            SimError::Geometry(format!(
                                "{}:{}: malformed vertex line",
                                path.display(),
                                lineno + 1
                            ))
                        })?;
                }
                vertices.push(Vector3::from(coords));
            }
            Some("f") => {
                let mut idx = [0usize; 3];
                for i in &mut idx {
                    // Accept `f 1 2 3`; reject texture/normal slots.
                    let field = fields.next().ok_or_else(|| {
                        SimError::Geometry(format!(
                            "{}:{}: malformed face line",
                            path.display(),
                            lineno + 1
                        ))
                    })?;
                    let one_based: usize = field.parse().map_err(|_| {
                        SimError::Geometry(format!(
                            "{}:{}: unsupported face index `{field}`",
                            path.display(),
                            lineno + 1
                        ))
                    })?;
                    if one_based == 0 {
                        return Err(SimError::Geometry(format!(
                            "{}:{}: face index 0 is invalid",
                            path.display(),
                            lineno + 1
                        )));
                    }
                    *i = one_based - 1;
                }
                faces.push(idx);
            }
            _ => {}
        }
    }
    debug!(
        "read {}: {} vertices, {} faces",
        path.display(),
        vertices.len(),
        faces.len()
    );
    Ok((vertices, faces))
}

pub fn write_obj<P: AsRef<Path>>(
    path: P,
    vertices: &[Vector3<f64>],
    faces: &[[usize; 3]],
) -> Result<(), SimError> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in vertices {
        writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for f in faces {
        writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::tests::cube;

    #[test]
    fn obj_roundtrip() {
        let m = cube();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.obj");
        write_obj(&path, m.vertices(), m.faces()).unwrap();
        let (v, f) = read_obj(&path).unwrap();
        assert_eq!(v.len(), m.num_vertices());
        assert_eq!(f, m.faces());
        for (a, b) in v.iter().zip(m.vertices()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn ignores_comments_and_rejects_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.obj");
        std::fs::write(&path, "# comment\nvn 0 0 1\nv 1 2 3\n").unwrap();
        let (v, f) = read_obj(&path).unwrap();
        assert_eq!(v.len(), 1);
        assert!(f.is_empty());

        std::fs::write(&path, "v 0 0 0\nf 1/1 2/2 3/3\n").unwrap();
        assert!(read_obj(&path).is_err());
    }
}
