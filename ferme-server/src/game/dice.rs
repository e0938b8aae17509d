//! Dice Sources
//!
//! Every face the engine sees comes through [`DieSource`], so a game can be
//! driven by the seeded PRNG in production or by a fixed script in tests.

use std::collections::VecDeque;

use crate::core::rng::DeterministicRng;
use crate::game::face::{Face, Fruit};

/// Source of die faces.
pub trait DieSource {
    /// Draw one face, uniformly over all six.
    fn draw(&mut self) -> Face;

    /// Draw until a fruit comes up, discarding `BAR` faces.
    fn draw_fruit(&mut self) -> Fruit {
        loop {
            if let Some(fruit) = self.draw().fruit() {
                return fruit;
            }
        }
    }
}

impl DieSource for DeterministicRng {
    fn draw(&mut self) -> Face {
        Face::ALL[self.next_int(Face::ALL.len() as u32) as usize]
    }
}

impl<D: DieSource + ?Sized> DieSource for &mut D {
    fn draw(&mut self) -> Face {
        (**self).draw()
    }
}

/// Replays a fixed sequence of faces.
///
/// Panics when the script runs out: a test that draws more dice than it
/// scripted is a broken test.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDice {
    faces: VecDeque<Face>,
}

impl ScriptedDice {
    /// Create a script from faces in draw order.
    pub fn new(faces: impl IntoIterator<Item = Face>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Append more faces to the end of the script.
    pub fn push(&mut self, face: Face) {
        self.faces.push_back(face);
    }

    /// Faces not yet drawn.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DieSource for ScriptedDice {
    fn draw(&mut self) -> Face {
        match self.faces.pop_front() {
            Some(face) => face,
            None => panic!("scripted dice exhausted"),
        }
    }
}
