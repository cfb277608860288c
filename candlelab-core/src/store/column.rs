/// Growable typed column with amortized-doubling appends and an explicit
/// shrink once the owner seals itself.
#[derive(Debug, Clone, Default)]
pub struct Column<T> {
    data: Vec<T>,
}

impl<T: Copy> Column<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        if self.data.len() == self.data.capacity() {
            // Double (minimum 8) instead of leaving growth policy implicit.
            let grow = self.data.capacity().max(8);
            self.data.reserve_exact(grow);
        }
        self.data.push(value);
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last(&self) -> Option<T> {
        self.data.last().copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Release slack capacity. Called once when the owning store seals.
    pub fn shrink(&mut self) {
        self.data.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get() {
        let mut col: Column<i64> = Column::new();
        for i in 0..100 {
            col.push(i);
        }
        assert_eq!(col.len(), 100);
        assert_eq!(col.get(0), Some(0));
        assert_eq!(col.get(99), Some(99));
        assert_eq!(col.get(100), None);
    }

    #[test]
    fn growth_is_amortized() {
        let mut col: Column<f64> = Column::new();
        let mut reallocations = 0;
        let mut last_cap = 0;
        for i in 0..1000 {
            col.push(i as f64);
            let cap = col.data.capacity();
            if cap != last_cap {
                reallocations += 1;
                last_cap = cap;
            }
        }
        // Doubling from 8 reaches 1000 elements in a handful of steps.
        assert!(reallocations <= 9, "too many reallocations: {reallocations}");
        assert_eq!(col.len(), 1000);
    }

    #[test]
    fn shrink_keeps_contents() {
        let mut col: Column<u64> = Column::with_capacity(128);
        for i in 0..10 {
            col.push(i);
        }
        col.shrink();
        assert_eq!(col.len(), 10);
        assert_eq!(col.last(), Some(9));
    }
}
