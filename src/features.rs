use bitflags::bitflags;

bitflags! {
    /// Enabled WebAssembly proposals. A disabled proposal rejects its
    /// opcodes, type encodings, and sections during decode, parse, and
    /// validation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        const MUTABLE_GLOBALS = 1 << 0;
        const SIGN_EXTENSION = 1 << 1;
        const SATURATING_FLOAT_TO_INT = 1 << 2;
        const MULTI_VALUE = 1 << 3;
        const REFERENCE_TYPES = 1 << 4;
        const BULK_MEMORY = 1 << 5;
        const TAIL_CALL = 1 << 6;
        const THREADS = 1 << 7;
        const SIMD = 1 << 8;
        const EXCEPTIONS = 1 << 9;
        const FUNCTION_REFERENCES = 1 << 10;
        const MEMORY64 = 1 << 11;
        const GC = 1 << 12;
        const BRANCH_HINTING = 1 << 13;
    }
}

/// Kebab-case names, the CLI `--enable-*`/`--disable-*` vocabulary.
pub const FEATURE_NAMES: &[(&str, Features)] = &[
    ("mutable-globals", Features::MUTABLE_GLOBALS),
    ("sign-extension", Features::SIGN_EXTENSION),
    ("saturating-float-to-int", Features::SATURATING_FLOAT_TO_INT),
    ("multi-value", Features::MULTI_VALUE),
    ("reference-types", Features::REFERENCE_TYPES),
    ("bulk-memory", Features::BULK_MEMORY),
    ("tail-call", Features::TAIL_CALL),
    ("threads", Features::THREADS),
    ("simd", Features::SIMD),
    ("exceptions", Features::EXCEPTIONS),
    ("function-references", Features::FUNCTION_REFERENCES),
    ("memory64", Features::MEMORY64),
    ("gc", Features::GC),
    ("branch-hinting", Features::BRANCH_HINTING),
];

impl Features {
    pub const NONE: Features = Features::empty();

    /// The original core spec with no proposals.
    pub fn mvp() -> Features {
        Features::empty()
    }

    /// Proposals merged into the spec, the default the tools run with.
    pub fn standard() -> Features {
        Features::MUTABLE_GLOBALS
            | Features::SIGN_EXTENSION
            | Features::SATURATING_FLOAT_TO_INT
            | Features::MULTI_VALUE
            | Features::REFERENCE_TYPES
            | Features::BULK_MEMORY
    }

    pub fn by_name(name: &str) -> Option<Features> {
        FEATURE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    pub fn enable(&mut self, feature: Features) {
        self.insert(feature);
        // The gc type lattice assumes reference types exist.
        if feature.contains(Features::GC) {
            self.insert(Features::REFERENCE_TYPES);
        }
        if feature.contains(Features::FUNCTION_REFERENCES) {
            self.insert(Features::REFERENCE_TYPES);
        }
    }

    pub fn disable(&mut self, feature: Features) {
        self.remove(feature);
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup() {
        assert_eq!(Features::by_name("simd"), Some(Features::SIMD));
        assert_eq!(Features::by_name("no-such"), None);
    }

    #[test]
    fn gc_implies_reference_types() {
        let mut f = Features::mvp();
        f.enable(Features::GC);
        assert!(f.contains(Features::REFERENCE_TYPES));
    }
}
