//! Copy tracing infrastructure.
//!
//! Provides a trait-based tracing system for the copy engine with zero-cost abstraction.
//! When using [`NoopTracer`], all trace methods compile away entirely via monomorphization,
//! the same way [`NoLimitTracker`](crate::resource::NoLimitTracker) eliminates resource
//! checking overhead.
//!
//! # Architecture
//!
//! The [`CopyTracer`] trait defines hook points at key engine events (shallow
//! duplication, visited-set hits, field-set computation, special-case handling).
//! Concrete implementations collect different kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable copy log to stderr |
//! | [`ProfilingTracer`] | Counters per object kind and maximum depth |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |
//!
//! # Usage
//!
//! ```ignore
//! let mut tracer = ProfilingTracer::new();
//! let copy = deep_copy_traced(&mut space, &root, &mut tracer)?;
//! println!("{}", tracer.report());
//! ```

use std::fmt;

use ahash::AHashMap;

use crate::{heap::HeapId, types::TypeId};

/// Trace event emitted during a copy.
///
/// Used by [`RecordingTracer`] to capture a full trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A shallow duplicate was produced and is about to be filled in.
    Duplicate {
        /// Heap id of the original, `None` for inline structs.
        original: Option<HeapId>,
        /// Object kind: `"instance"`, `"array"` or `"struct"`.
        kind: &'static str,
        /// Number of composites/arrays being copied, this one excluded.
        depth: usize,
    },
    /// A tracked reference resolved to an already-produced copy.
    MemoHit { original: HeapId, copy: HeapId },
    /// A type's deep-copyable field set was computed (field-set cache miss).
    FieldSetComputed {
        ty: TypeId,
        /// Number of fields that survived atomic filtering.
        fields: usize,
    },
    /// A callable was replaced by null.
    CallableDropped { depth: usize },
    /// A document node was cloned by the document subsystem.
    DocumentCloned { depth: usize },
}

/// Trait for copy tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code and compiles to zero instructions. Implementations only
/// override the hooks they care about.
pub trait CopyTracer: fmt::Debug {
    /// Called after a shallow duplicate is made, before its fields or elements are copied.
    ///
    /// # Arguments
    /// * `original` - Heap id of the original (`None` for inline structs)
    /// * `kind` - `"instance"`, `"array"` or `"struct"`
    /// * `depth` - Number of composites/arrays currently being copied
    #[inline(always)]
    fn on_duplicate(&mut self, _original: Option<HeapId>, _kind: &'static str, _depth: usize) {}

    /// Called when a tracked reference is found in the visited set.
    #[inline(always)]
    fn on_memo_hit(&mut self, _original: HeapId, _copy: HeapId) {}

    /// Called when a type's field set is computed rather than served from the cache.
    #[inline(always)]
    fn on_field_set_computed(&mut self, _ty: TypeId, _fields: usize) {}

    /// Called when a callable is dropped from the copy.
    #[inline(always)]
    fn on_callable_dropped(&mut self, _depth: usize) {}

    /// Called when a document node is cloned.
    #[inline(always)]
    fn on_document_cloned(&mut self, _depth: usize) {}
}

impl<Tr: CopyTracer + ?Sized> CopyTracer for &mut Tr {
    #[inline]
    fn on_duplicate(&mut self, original: Option<HeapId>, kind: &'static str, depth: usize) {
        (**self).on_duplicate(original, kind, depth);
    }

    #[inline]
    fn on_memo_hit(&mut self, original: HeapId, copy: HeapId) {
        (**self).on_memo_hit(original, copy);
    }

    #[inline]
    fn on_field_set_computed(&mut self, ty: TypeId, fields: usize) {
        (**self).on_field_set_computed(ty, fields);
    }

    #[inline]
    fn on_callable_dropped(&mut self, depth: usize) {
        (**self).on_callable_dropped(depth);
    }

    #[inline]
    fn on_document_cloned(&mut self, depth: usize) {
        (**self).on_document_cloned(depth);
    }
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl CopyTracer for NoopTracer {}

// ============================================================================
// StderrTracer
// ============================================================================

/// Tracer that prints a human-readable copy log to stderr.
///
/// Output format:
/// ```text
///   +++ DUP instance #3         depth=0
///     +++ DUP array #5          depth=1
///     === MEMO #3 -> #9
///     --- DROP callable         depth=2
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print. None = unlimited.
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn emit(&mut self, depth: usize, line: fmt::Arguments<'_>) {
        if self.limit.is_some_and(|limit| self.count >= limit) {
            return;
        }
        eprintln!("{:indent$}{line}", "", indent = 2 + depth * 2);
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count == limit
        {
            eprintln!("--- trace limit reached ({limit} lines) ---");
        }
    }
}

impl CopyTracer for StderrTracer {
    fn on_duplicate(&mut self, original: Option<HeapId>, kind: &'static str, depth: usize) {
        match original {
            Some(id) => self.emit(depth, format_args!("+++ DUP {kind} #{:<12} depth={depth}", id.index())),
            None => self.emit(depth, format_args!("+++ DUP {kind:<20} depth={depth}")),
        }
    }

    fn on_memo_hit(&mut self, original: HeapId, copy: HeapId) {
        self.emit(0, format_args!("=== MEMO #{} -> #{}", original.index(), copy.index()));
    }

    fn on_field_set_computed(&mut self, ty: TypeId, fields: usize) {
        self.emit(0, format_args!("... FIELDS type={} deep={fields}", ty.index()));
    }

    fn on_callable_dropped(&mut self, depth: usize) {
        self.emit(depth, format_args!("--- DROP callable         depth={depth}"));
    }

    fn on_document_cloned(&mut self, depth: usize) {
        self.emit(depth, format_args!("+++ CLONE document        depth={depth}"));
    }
}

// ============================================================================
// ProfilingTracer
// ============================================================================

/// Tracer that collects copy statistics.
///
/// Retrieve results via [`ProfilingTracer::report`] after the copy.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    duplicates_by_kind: AHashMap<&'static str, u64>,
    memo_hits: u64,
    field_sets_computed: u64,
    callables_dropped: u64,
    documents_cloned: u64,
    max_depth: usize,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingReport {
    /// Duplicates per object kind, sorted by count (highest first).
    pub duplicates_by_kind: Vec<(&'static str, u64)>,
    pub total_duplicates: u64,
    pub memo_hits: u64,
    pub field_sets_computed: u64,
    pub callables_dropped: u64,
    pub documents_cloned: u64,
    /// Deepest nesting of composites/arrays observed.
    pub max_depth: usize,
}

impl ProfilingTracer {
    /// Creates a new profiling tracer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a report from the collected data.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut duplicates_by_kind: Vec<_> = self.duplicates_by_kind.iter().map(|(&k, &v)| (k, v)).collect();
        duplicates_by_kind.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ProfilingReport {
            total_duplicates: duplicates_by_kind.iter().map(|(_, count)| count).sum(),
            duplicates_by_kind,
            memo_hits: self.memo_hits,
            field_sets_computed: self.field_sets_computed,
            callables_dropped: self.callables_dropped,
            documents_cloned: self.documents_cloned,
            max_depth: self.max_depth,
        }
    }
}

impl CopyTracer for ProfilingTracer {
    #[inline]
    fn on_duplicate(&mut self, _original: Option<HeapId>, kind: &'static str, depth: usize) {
        *self.duplicates_by_kind.entry(kind).or_insert(0) += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_memo_hit(&mut self, _original: HeapId, _copy: HeapId) {
        self.memo_hits += 1;
    }

    fn on_field_set_computed(&mut self, _ty: TypeId, _fields: usize) {
        self.field_sets_computed += 1;
    }

    fn on_callable_dropped(&mut self, _depth: usize) {
        self.callables_dropped += 1;
    }

    fn on_document_cloned(&mut self, _depth: usize) {
        self.documents_cloned += 1;
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Copy Profiling Report ===")?;
        writeln!(f, "Duplicates:          {}", self.total_duplicates)?;
        writeln!(f, "Visited-set hits:    {}", self.memo_hits)?;
        writeln!(f, "Field sets computed: {}", self.field_sets_computed)?;
        writeln!(f, "Callables dropped:   {}", self.callables_dropped)?;
        writeln!(f, "Documents cloned:    {}", self.documents_cloned)?;
        writeln!(f, "Max depth:           {}", self.max_depth)?;
        writeln!(f)?;
        writeln!(f, "--- Duplicates by kind ---")?;
        for (kind, count) in &self.duplicates_by_kind {
            let pct = (*count as f64 / self.total_duplicates as f64) * 100.0;
            writeln!(f, "  {kind:<10} {count:>10}  ({pct:>5.1}%)")?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer
// ============================================================================

/// Tracer that records all events in chronological order.
///
/// The most expensive tracer (allocates per event), so use it for debugging
/// or in tests.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    /// Creates a new recording tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn push(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|l| self.events.len() >= l) {
            return;
        }
        self.events.push(event);
    }
}

impl CopyTracer for RecordingTracer {
    fn on_duplicate(&mut self, original: Option<HeapId>, kind: &'static str, depth: usize) {
        self.push(TraceEvent::Duplicate { original, kind, depth });
    }

    fn on_memo_hit(&mut self, original: HeapId, copy: HeapId) {
        self.push(TraceEvent::MemoHit { original, copy });
    }

    fn on_field_set_computed(&mut self, ty: TypeId, fields: usize) {
        self.push(TraceEvent::FieldSetComputed { ty, fields });
    }

    fn on_callable_dropped(&mut self, depth: usize) {
        self.push(TraceEvent::CallableDropped { depth });
    }

    fn on_document_cloned(&mut self, depth: usize) {
        self.push(TraceEvent::DocumentCloned { depth });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn recording_tracer_respects_limit() {
        let mut tracer = RecordingTracer::with_limit(2);
        tracer.on_callable_dropped(0);
        tracer.on_document_cloned(1);
        tracer.on_callable_dropped(2);
        assert_eq!(
            tracer.into_events(),
            vec![
                TraceEvent::CallableDropped { depth: 0 },
                TraceEvent::DocumentCloned { depth: 1 }
            ]
        );
    }

    #[test]
    fn profiling_report_sorts_by_frequency() {
        let mut tracer = ProfilingTracer::new();
        tracer.on_duplicate(None, "struct", 3);
        tracer.on_duplicate(None, "array", 1);
        tracer.on_duplicate(None, "array", 0);
        tracer.on_callable_dropped(0);

        let report = tracer.report();
        assert_eq!(report.duplicates_by_kind, vec![("array", 2), ("struct", 1)]);
        assert_eq!(report.total_duplicates, 3);
        assert_eq!(report.max_depth, 3);
        assert_eq!(report.callables_dropped, 1);
        assert!(report.to_string().contains("Duplicates:          3"));
    }
}
