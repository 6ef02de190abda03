//! Line-oriented code writer with indentation tracking.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(self.depth), text));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    /// Writes `header {` and indents.
    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
        self
    }

    /// Indents without writing an opener, for continuation lines such as call
    /// arguments. Pair with [`CodeWriter::close_with`].
    pub fn indent(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.close_with("}")
    }

    /// Dedents and writes a custom closer such as `},` or `});`.
    pub fn close_with(&mut self, closer: impl AsRef<str>) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(closer)
    }

    /// Appends pre-rendered lines at the current depth.
    pub fn lines<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line);
        }
        self
    }

    /// Appends a multi-line fragment, re-indenting each of its lines.
    pub fn fragment(&mut self, text: &str) -> &mut Self {
        self.lines(text.lines())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// A value being encoded: a struct field (`self.x`) or a reference binding
/// (`v` from `if let` or a loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'s> {
    Place(&'s str),
    Ref(&'s str),
}

impl Value<'_> {
    /// The value itself, for `Copy` types.
    pub fn copied(&self) -> String {
        match self {
            Value::Place(place) => place.to_string(),
            Value::Ref(name) => format!("*{}", name),
        }
    }

    /// A shared reference to the value.
    pub fn borrowed(&self) -> String {
        match self {
            Value::Place(place) => format!("&{}", place),
            Value::Ref(name) => name.to_string(),
        }
    }

    /// The value as a method-call receiver.
    pub fn receiver(&self) -> String {
        match self {
            Value::Place(place) => place.to_string(),
            Value::Ref(name) => name.to_string(),
        }
    }

    pub fn cloned(&self, copy: bool) -> String {
        if copy {
            self.copied()
        } else {
            format!("{}.clone()", self.receiver())
        }
    }
}
