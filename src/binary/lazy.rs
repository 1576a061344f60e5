//! Lazy section decoding: iterators that yield one decoded element
//! per call, carrying the cursor inside. A failed element drops the
//! rest of its sequence but nothing outside it.

use crate::binary::read::{read_count, ReadCtx};
use crate::span::{At, SpanU8};

pub type ReadFn<'a, T> = fn(&mut SpanU8<'a>, &mut ReadCtx) -> Option<At<T>>;

pub struct LazySequence<'a, 'c, 'e, T> {
    span: SpanU8<'a>,
    ctx: &'c mut ReadCtx<'e>,
    read: ReadFn<'a, T>,
    failed: bool,
}

impl<'a, 'c, 'e, T> LazySequence<'a, 'c, 'e, T> {
    pub fn new(span: SpanU8<'a>, ctx: &'c mut ReadCtx<'e>, read: ReadFn<'a, T>) -> Self {
        LazySequence { span, ctx, read, failed: false }
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn rest(&self) -> SpanU8<'a> {
        self.span
    }
}

impl<'a, T> Iterator for LazySequence<'a, '_, '_, T> {
    type Item = At<T>;

    fn next(&mut self) -> Option<At<T>> {
        if self.failed || self.span.is_empty() {
            return None;
        }
        match (self.read)(&mut self.span, self.ctx) {
            Some(item) => Some(item),
            None => {
                // The cursor sits at the offending byte; there is no
                // way to find the next element boundary, so the rest
                // of the sequence is abandoned.
                self.span.skip_rest();
                self.failed = true;
                None
            }
        }
    }
}

/// Count-prefixed lazy sequence, the shape of every known section.
pub struct LazySection<'a, 'c, 'e, T> {
    count: u32,
    remaining: u32,
    sequence: LazySequence<'a, 'c, 'e, T>,
}

impl<'a, 'c, 'e, T> LazySection<'a, 'c, 'e, T> {
    pub fn new(
        mut span: SpanU8<'a>,
        ctx: &'c mut ReadCtx<'e>,
        read: ReadFn<'a, T>,
    ) -> Option<Self> {
        let count = read_count(&mut span, ctx)?;
        Some(LazySection {
            count: count.value,
            remaining: count.value,
            sequence: LazySequence::new(span, ctx, read),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Post-iteration check: every declared element seen and no bytes
    /// left over.
    pub fn finish(self) -> bool {
        if self.sequence.failed {
            return false;
        }
        if self.remaining > 0 {
            let loc = self.sequence.span.loc();
            self.sequence.ctx.error(
                loc,
                format!("Expected {} more elements in section", self.remaining),
            );
            return false;
        }
        if !self.sequence.span.is_empty() {
            let loc = self.sequence.span.loc();
            self.sequence
                .ctx
                .error(loc, "unused bytes at end of section".to_string());
            return false;
        }
        true
    }
}

impl<'a, T> Iterator for LazySection<'a, '_, '_, T> {
    type Item = At<T>;

    fn next(&mut self) -> Option<At<T>> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.sequence.next()?;
        self.remaining -= 1;
        Some(item)
    }
}
