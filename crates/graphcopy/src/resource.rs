use std::fmt;

/// Error returned when a resource limit is exceeded while building or copying a graph.
///
/// Heaps consult their tracker on every allocation, and the copy engine consults it
/// before descending one level deeper, so adversarial inputs surface as errors
/// instead of exhausting memory or the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum memory usage exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum recursion depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Recursion { limit, depth } => {
                write!(f, "maximum recursion depth exceeded: {depth} > {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Trait for tracking resource usage of an object space.
///
/// Implementations can enforce limits on allocations, memory and traversal depth.
/// The heap is generic over its tracker so the unlimited tracker compiles down to
/// (almost) nothing.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each heap allocation.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or `Err(ResourceError)`
    /// if a limit would be exceeded.
    ///
    /// # Arguments
    /// * `get_size` - Lazily computes the approximate size in bytes of the allocation
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called before the copy engine descends into a composite or array.
    ///
    /// # Arguments
    /// * `current_depth` - Number of composites/arrays currently being copied
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Returns the current approximate memory usage in bytes, if tracked.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// Recursion depth applied by [`ResourceLimits::new`].
///
/// The copy engine recurses natively, so the stack a copy needs grows with the
/// nesting depth of the graph. Debug builds use a few kilobytes per level: a
/// graph this deep needs a thread stack of several megabytes there, while
/// release builds fit comfortably in the 8MB main-thread stack.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// A resource tracker with no limits at all.
///
/// Nesting depth is unbounded too: copying a graph deeper than the thread's stack
/// can hold overflows it. Use a [`LimitedTracker`] to cap depth for untrusted graphs.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn check_recursion_depth(&self, _current_depth: usize) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits, or build custom limits
/// with the builder pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of heap allocations allowed.
    pub max_allocations: Option<usize>,
    /// Maximum heap memory in bytes (approximate).
    pub max_memory: Option<usize>,
    /// Maximum nesting depth of composites/arrays during a copy.
    pub max_recursion_depth: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with everything disabled except recursion, which is set to
    /// [`DEFAULT_MAX_RECURSION_DEPTH`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            ..Default::default()
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum memory usage in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Sets the maximum recursion depth; `None` disables the check.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }
}

/// A resource tracker that enforces configurable limits.
///
/// Tracks allocation count and approximate memory usage, returning errors when
/// limits are exceeded. Counters are cumulative for the lifetime of the heap;
/// the arena never frees individual objects.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Current approximate memory usage in bytes.
    current_memory: usize,
}

impl LimitedTracker {
    /// Creates a new LimitedTracker with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            current_memory: 0,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        let size = get_size();
        if let Some(max) = self.limits.max_memory {
            let new_memory = self.current_memory + size;
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
        }

        self.allocation_count += 1;
        self.current_memory += size;
        Ok(())
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth {
            // current_depth is before descending, so the new depth is current_depth + 1
            if current_depth >= max {
                return Err(ResourceError::Recursion {
                    limit: max,
                    depth: current_depth + 1,
                });
            }
        }
        Ok(())
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.current_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_tracker_rejects_allocation_past_limit() {
        let mut tracker = LimitedTracker::new(ResourceLimits::new().max_allocations(2));
        assert!(tracker.on_allocate(|| 8).is_ok());
        assert!(tracker.on_allocate(|| 8).is_ok());
        assert_eq!(
            tracker.on_allocate(|| 8),
            Err(ResourceError::Allocation { limit: 2, count: 3 })
        );
        assert_eq!(tracker.allocation_count, 2);
    }

    #[test]
    fn limited_tracker_rejects_memory_past_limit() {
        let mut tracker = LimitedTracker::new(ResourceLimits::default().max_memory(100));
        assert!(tracker.on_allocate(|| 60).is_ok());
        assert_eq!(
            tracker.on_allocate(|| 60),
            Err(ResourceError::Memory { limit: 100, used: 120 })
        );
        assert_eq!(ResourceTracker::current_memory_bytes(&tracker), Some(60));
    }

    #[test]
    fn recursion_limit_can_be_disabled() {
        let tracker = LimitedTracker::new(ResourceLimits::new().max_recursion_depth(None));
        assert!(tracker.check_recursion_depth(1_000_000).is_ok());

        let tracker = LimitedTracker::new(ResourceLimits::new().max_recursion_depth(Some(3)));
        assert!(tracker.check_recursion_depth(2).is_ok());
        assert_eq!(
            tracker.check_recursion_depth(3),
            Err(ResourceError::Recursion { limit: 3, depth: 4 })
        );
    }

    #[test]
    fn no_limit_tracker_never_limits_depth() {
        assert!(NoLimitTracker.check_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH * 10).is_ok());
        let defaults = LimitedTracker::new(ResourceLimits::new());
        assert_eq!(
            defaults.check_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH),
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
                depth: DEFAULT_MAX_RECURSION_DEPTH + 1
            })
        );
    }

    #[test]
    fn limits_deserialize_from_json() {
        let limits: ResourceLimits =
            serde_json::from_str(r#"{"max_allocations": 10, "max_memory": null, "max_recursion_depth": 50}"#).unwrap();
        assert_eq!(limits, ResourceLimits::default().max_allocations(10).max_recursion_depth(Some(50)));
    }
}
