use thiserror::Error;

/// Most cars that can be compared side by side
pub const MAX_COMPARE: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum CompareError {
    #[error("You can compare up to {MAX_COMPARE} cars at a time")]
    Full,
}

/// Selection of car ids for side-by-side comparison, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareSet {
    ids: Vec<u32>,
}

impl CompareSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `id` if selected, otherwise adds it. Returns whether it is now selected.
    pub fn toggle(&mut self, id: u32) -> Result<bool, CompareError> {
        if let Some(pos) = self.ids.iter().position(|&i| i == id) {
            self.ids.remove(pos);
            return Ok(false);
        }
        if self.ids.len() >= MAX_COMPARE {
            return Err(CompareError::Full);
        }
        self.ids.push(id);
        Ok(true)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// A comparison needs at least two cars
    pub fn is_ready(&self) -> bool {
        self.ids.len() >= 2
    }
}
