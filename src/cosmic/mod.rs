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

//! The physical actors of the simulation: the rotating asteroid, the
//! dumbbell spacecraft, and its 18-dimensional rigid body state.

mod asteroid;
mod dumbbell;
mod state;

pub use asteroid::{Asteroid, AsteroidConstants};
pub use dumbbell::Dumbbell;
pub use state::{State, StateVector};
