use std::fmt;

use crate::span::Location;

/// Sink for collected diagnostics. Contexts nest with the caller's
/// recursion; a reported error is decorated with every open context.
pub trait Errors {
    fn push_context(&mut self, loc: Location, desc: &str);
    fn pop_context(&mut self);
    fn on_error(&mut self, loc: Location, message: String);
}

/// One collected diagnostic: the terminal message plus the contexts
/// that were open when it was reported, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub loc: Location,
    pub message: String,
    pub contexts: Vec<(Location, String)>,
}

impl Error {
    /// Render as "ctx1/ctx2: message".
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (_, desc) in &self.contexts {
            out.push_str(desc);
            out.push_str("/ ");
        }
        out.push_str(&self.message);
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.describe())
    }
}

/// Default collector. Owns the context stack and the error list.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<Error>,
    contexts: Vec<(Location, String)>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(Error::describe).collect()
    }

    /// Render every error with line/column positions computed from
    /// `source`. Used by the text pipeline and the CLI.
    pub fn display_text(&self, source: &str) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                let (line, col) = offset_to_line_col(source, e.loc.start);
                format!("{}:{}: {}", line, col, e.describe())
            })
            .collect()
    }

    /// Render every error with byte offsets. Used for binary input.
    pub fn display_binary(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{:#08x}: {}", e.loc.start, e.describe()))
            .collect()
    }
}

impl Errors for ErrorList {
    fn push_context(&mut self, loc: Location, desc: &str) {
        self.contexts.push((loc, desc.to_string()));
    }

    fn pop_context(&mut self) {
        // Popping past the bottom is a caller bug; ignore rather than
        // corrupt the stack of an unrelated caller.
        self.contexts.pop();
    }

    fn on_error(&mut self, loc: Location, message: String) {
        self.errors.push(Error {
            loc,
            message,
            contexts: self.contexts.clone(),
        });
    }
}

/// Run `f` with a context pushed, popping it on every exit path.
pub fn with_context<T>(
    errors: &mut dyn Errors,
    loc: Location,
    desc: &str,
    f: impl FnOnce(&mut dyn Errors) -> T,
) -> T {
    errors.push_context(loc, desc);
    let result = f(errors);
    errors.pop_context();
    result
}

/// 1-based line and column for a byte offset into `source`.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_decorate_errors_lifo() {
        let mut errors = ErrorList::new();
        errors.push_context(Location::at(0), "while reading function 3");
        errors.push_context(Location::at(4), "while reading instruction 12");
        errors.on_error(Location::at(9), "unknown opcode 0xff".to_string());
        errors.pop_context();
        errors.pop_context();
        errors.on_error(Location::at(10), "bare".to_string());

        let messages = errors.messages();
        assert_eq!(
            messages[0],
            "while reading function 3/ while reading instruction 12/ unknown opcode 0xff"
        );
        assert_eq!(messages[1], "bare");
    }

    #[test]
    fn with_context_pops_on_early_return() {
        let mut errors = ErrorList::new();
        let result: Option<u32> = with_context(
            &mut errors,
            Location::at(0),
            "outer",
            |errors| {
                errors.on_error(Location::at(1), "inner failure".to_string());
                None
            },
        );
        assert!(result.is_none());
        errors.on_error(Location::at(2), "after".to_string());
        assert_eq!(errors.messages()[1], "after");
    }

    #[test]
    fn line_col() {
        let src = "ab\ncd\nef";
        assert_eq!(offset_to_line_col(src, 0), (1, 1));
        assert_eq!(offset_to_line_col(src, 4), (2, 2));
        assert_eq!(offset_to_line_col(src, 6), (3, 1));
    }
}
