// Keystage Output Key State
// Bookkeeping of the keys the stage holds down on the output

use crate::Key;

/// A key the stage pressed, or suppressed, on behalf of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDown {
    /// The output key
    pub key: Key,
    /// The input key whose press caused this entry
    pub trigger: Key,
    /// The trigger's output negated the key, it is not down
    pub suppressed: bool,
    /// Released while a negating trigger is held
    pub temporarily_released: bool,
    /// Pressed again while already down, the next release is swallowed
    pub pressed_twice: bool,
}

impl OutputDown {
    pub fn new(key: Key, trigger: Key) -> Self {
        Self {
            key,
            trigger,
            suppressed: false,
            temporarily_released: false,
            pressed_twice: false,
        }
    }

    pub fn suppression(key: Key, trigger: Key) -> Self {
        Self {
            suppressed: true,
            ..Self::new(key, trigger)
        }
    }

    /// Whether the key is currently down on the output
    pub fn is_down(&self) -> bool {
        !self.suppressed && !self.temporarily_released
    }
}

/// Ordered list of output entries, in press order
#[derive(Debug, Clone, Default)]
pub struct OutputState {
    entries: Vec<OutputDown>,
}

impl OutputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a key is down on the output
    pub fn is_down(&self, key: Key) -> bool {
        self.entries.iter().any(|e| e.key == key && e.is_down())
    }

    /// Index of the entry which pressed `key`
    pub fn position(&self, key: Key) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key && !e.suppressed)
    }

    /// Whether a held trigger currently suppresses `key`
    pub fn is_suppressed(&self, key: Key) -> bool {
        self.entries.iter().any(|e| e.key == key && e.suppressed)
    }

    pub fn get(&self, index: usize) -> Option<&OutputDown> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut OutputDown> {
        self.entries.get_mut(index)
    }

    pub fn push(&mut self, entry: OutputDown) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, index: usize) -> OutputDown {
        self.entries.remove(index)
    }

    /// Remove all entries of `trigger`, returned in press order
    pub fn take_triggered(&mut self, trigger: Key) -> Vec<OutputDown> {
        let mut taken = Vec::new();
        self.entries.retain(|e| {
            if e.trigger == trigger {
                taken.push(*e);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Keys pressed on behalf of `trigger`, in press order
    pub fn keys_down_for(&self, trigger: Key) -> impl Iterator<Item = Key> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.trigger == trigger && e.is_down())
            .map(|e| e.key)
    }

    pub fn entries(&self) -> &[OutputDown] {
        &self.entries
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OutputDown> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
