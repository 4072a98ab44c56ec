// Largest value a small integer can hold on the target pointer width.
#[cfg(target_pointer_width = "64")]
const MAX_SMI: usize = i32::MAX as usize;
#[cfg(not(target_pointer_width = "64"))]
const MAX_SMI: usize = (1 << 30) - 1;

/// Upper bound on the byte length of any view or buffer.
pub const DEFAULT_MAX_BYTE_LENGTH: usize = 8 * MAX_SMI;

/// Views whose backing store fits in this many bytes live in the inline heap.
pub const DEFAULT_MAX_INLINE_BYTE_LENGTH: usize = 64;

/// Object allocations between two inline heap compactions.
pub const DEFAULT_GC_THRESHOLD: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_byte_length: usize,
    pub max_inline_byte_length: usize,
    pub gc_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_byte_length: DEFAULT_MAX_BYTE_LENGTH,
            max_inline_byte_length: DEFAULT_MAX_INLINE_BYTE_LENGTH,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_max_byte_length(mut self, max_byte_length: usize) -> Self {
        self.max_byte_length = max_byte_length;
        self
    }

    pub fn with_max_inline_byte_length(mut self, max_inline_byte_length: usize) -> Self {
        self.max_inline_byte_length = max_inline_byte_length;
        self
    }

    pub fn with_gc_threshold(mut self, gc_threshold: usize) -> Self {
        self.gc_threshold = gc_threshold.max(1);
        self
    }

    pub(crate) fn byte_length_is_valid(&self, byte_length: f64) -> bool {
        byte_length <= self.max_byte_length as f64
    }
}
