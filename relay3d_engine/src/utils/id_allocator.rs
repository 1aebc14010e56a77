use rustc_hash::FxHashSet;

/// Allocates and recycles GL-style object names.
///
/// Names are non-zero `u32` values (0 means "no object"). Freed names are
/// recycled on subsequent allocations, most recently freed first.
///
/// # Example
///
/// ```ignore
/// let mut ids = IdAllocator::new();
/// let a = ids.alloc();  // 1
/// let b = ids.alloc();  // 2
/// ids.free(a);          // 1 is now available
/// let c = ids.alloc();  // 1 (recycled)
/// ```
#[derive(Debug, Default)]
pub struct IdAllocator {
    free_list: Vec<u32>,
    live: FxHashSet<u32>,
    next_id: u32,
}

impl IdAllocator {
    /// Create a new empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next available name
    pub fn alloc(&mut self) -> u32 {
        let id = self.free_list.pop().unwrap_or_else(|| {
            self.next_id += 1;
            self.next_id
        });
        self.live.insert(id);
        id
    }

    /// Return a name to the pool
    ///
    /// Returns `false` (and changes nothing) if `id` is not currently live,
    /// i.e. a double free or a name this allocator never handed out.
    pub fn free(&mut self, id: u32) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        self.free_list.push(id);
        true
    }

    /// Whether `id` is currently allocated
    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    /// Highest name ever allocated
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of currently allocated names
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no names are currently allocated
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "id_allocator_tests.rs"]
mod tests;
