//! Axis names and the ordered axis table.

use heapless::{String, Vec};

use crate::MAX_AXES;

/// Short human-readable axis name (`"x"`, `"y"`, `"rotor"`, ...).
pub type AxisName = String<16>;

/// An ordered table of `(name, value)` pairs, one per configured motor.
///
/// Insertion order is axis order: the Nth entry corresponds to the Nth
/// motor's slot in a move segment's coefficient layout and in the pin-state
/// byte's endstop bits. This mirrors how the platform's motor list assigns
/// steps-per-mm and maximum speed per named axis, in the order the axes were
/// declared.
#[derive(Debug, Clone, Default)]
pub struct AxisTable<T> {
    entries: Vec<(AxisName, T), MAX_AXES>,
}

impl<T> AxisTable<T> {
    /// An empty table.
    pub const fn new() -> Self {
        AxisTable { entries: Vec::new() }
    }

    /// Appends `(name, value)`, preserving insertion order.
    ///
    /// Returns the value back as `Err` if the table is already at
    /// [`MAX_AXES`] capacity.
    pub fn push(&mut self, name: AxisName, value: T) -> Result<(), (AxisName, T)> {
        self.entries.push((name, value))
    }

    /// Number of axes currently in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no axes have been added yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a value by axis name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n.as_str() == name).map(|(_, v)| v)
    }

    /// Looks up a value by its 0-based position in insertion order.
    pub fn get_index(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut table: AxisTable<f32> = AxisTable::new();
        table.push(AxisName::from("x"), 76.2).unwrap();
        table.push(AxisName::from("y"), 76.2).unwrap();
        table.push(AxisName::from("rotor"), 1.0).unwrap();

        let names: Vec<&str, MAX_AXES> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names.as_slice(), &["x", "y", "rotor"]);
        assert_eq!(table.get("rotor"), Some(&1.0));
        assert_eq!(table.get_index(1), Some(&76.2));
    }

    #[test]
    fn rejects_beyond_capacity() {
        let mut table: AxisTable<u8> = AxisTable::new();
        for i in 0..MAX_AXES {
            table.push(AxisName::from("a"), i as u8).unwrap();
        }
        assert!(table.push(AxisName::from("overflow"), 0).is_err());
    }
}
