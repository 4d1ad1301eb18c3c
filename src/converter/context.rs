use std::time::{Duration, Instant};

/// Bookkeeping for a single compiler run.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub stats: CompilationStats,
    start_time: Option<Instant>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationStats {
    pub entries_seen: usize,
    pub structures_compiled: usize,
    pub skipped_not_structure: usize,
    pub skipped_status: usize,
    pub skipped_primitive: usize,
    pub elements_compiled: usize,
    pub types_dropped: usize,
    pub duration: Option<Duration>,
}

impl CompilationContext {
    pub fn begin() -> Self {
        Self {
            stats: CompilationStats::default(),
            start_time: Some(Instant::now()),
        }
    }

    pub fn finish(mut self) -> CompilationStats {
        if let Some(start_time) = self.start_time {
            self.stats.duration = Some(start_time.elapsed());
        }

        tracing::info!(
            "Compiled {} structure definitions ({} elements) from {} entries; skipped {} by status, {} primitive, {} non-structure; dropped {} code-less types",
            self.stats.structures_compiled,
            self.stats.elements_compiled,
            self.stats.entries_seen,
            self.stats.skipped_status,
            self.stats.skipped_primitive,
            self.stats.skipped_not_structure,
            self.stats.types_dropped,
        );

        self.stats
    }
}
