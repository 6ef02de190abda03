//! Deterministic walk over the enums and messages of one schema file.

use std::slice;

use serde::Serialize;

use crate::types::{EnumSchema, FileSchema, MessageSchema};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Declaration<'a> {
    Enum(&'a EnumSchema),
    Message(&'a MessageSchema),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visited<'a> {
    /// Reference form used by descriptors, e.g. `.pkg.Outer.Inner`.
    pub full_name:   String,
    /// Output symbol, e.g. `Outer_Inner`.
    pub symbol:      String,
    pub declaration: Declaration<'a>,
}

struct Level<'a> {
    enums:         slice::Iter<'a, EnumSchema>,
    messages:      slice::Iter<'a, MessageSchema>,
    full_prefix:   String,
    symbol_prefix: Option<String>,
}

impl Level<'_> {
    fn names(&self, name: &str) -> (String, String) {
        let full_name = format!("{}.{}", self.full_prefix, name);
        let symbol = match &self.symbol_prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name.to_string(),
        };
        (full_name, symbol)
    }
}

/// Yields, at each nesting level, every enum and then every message; a
/// message is yielded before its own nested declarations.
///
/// The walk holds only slice iterators, so a new `Visitor` over the same file
/// restarts it from the top.
pub struct Visitor<'a> {
    stack: Vec<Level<'a>>,
}

impl<'a> Visitor<'a> {
    pub fn new(file: &'a FileSchema) -> Self {
        let full_prefix = if file.package.is_empty() {
            String::new()
        } else {
            format!(".{}", file.package)
        };
        Self {
            stack: vec![Level {
                enums: file.enums.iter(),
                messages: file.messages.iter(),
                full_prefix,
                symbol_prefix: None,
            }],
        }
    }
}

impl<'a> Iterator for Visitor<'a> {
    type Item = Visited<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.last_mut()?;

            if let Some(enumeration) = level.enums.next() {
                let (full_name, symbol) = level.names(&enumeration.name);
                return Some(Visited {
                    full_name,
                    symbol,
                    declaration: Declaration::Enum(enumeration),
                });
            }

            if let Some(message) = level.messages.next() {
                let (full_name, symbol) = level.names(&message.name);
                self.stack.push(Level {
                    enums:         message.enums.iter(),
                    messages:      message.messages.iter(),
                    full_prefix:   full_name.clone(),
                    symbol_prefix: Some(symbol.clone()),
                });
                return Some(Visited {
                    full_name,
                    symbol,
                    declaration: Declaration::Message(message),
                });
            }

            self.stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Syntax;

    fn message(name: &str, messages: Vec<MessageSchema>, enums: Vec<EnumSchema>) -> MessageSchema {
        MessageSchema {
            name: name.to_string(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            messages,
            enums,
            map_entry: false,
        }
    }

    fn enumeration(name: &str) -> EnumSchema {
        EnumSchema {
            name:   name.to_string(),
            values: Vec::new(),
        }
    }

    #[test]
    fn walks_in_declaration_order() {
        let file = FileSchema {
            name:     "a.proto".to_string(),
            package:  "pkg".to_string(),
            syntax:   Syntax::Proto3,
            enums:    vec![enumeration("Top")],
            messages: vec![
                message(
                    "Outer",
                    vec![message("Inner", vec![message("Deep", vec![], vec![])], vec![])],
                    vec![enumeration("Kind")],
                ),
                message("Second", vec![], vec![]),
            ],
            services: Vec::new(),
        };

        let walked: Vec<(String, String)> = Visitor::new(&file)
            .map(|visited| (visited.full_name, visited.symbol))
            .collect();
        let expected = [
            (".pkg.Top", "Top"),
            (".pkg.Outer", "Outer"),
            (".pkg.Outer.Kind", "Outer_Kind"),
            (".pkg.Outer.Inner", "Outer_Inner"),
            (".pkg.Outer.Inner.Deep", "Outer_Inner_Deep"),
            (".pkg.Second", "Second"),
        ];
        assert_eq!(walked.len(), expected.len());
        for ((full, symbol), (want_full, want_symbol)) in walked.iter().zip(expected) {
            assert_eq!(full, want_full);
            assert_eq!(symbol, want_symbol);
        }

        // Restartable and deterministic.
        assert_eq!(Visitor::new(&file).count(), 6);
    }

    #[test]
    fn no_package() {
        let file = FileSchema {
            name:     "b.proto".to_string(),
            package:  String::new(),
            syntax:   Syntax::Proto2,
            enums:    Vec::new(),
            messages: vec![message("Solo", vec![], vec![])],
            services: Vec::new(),
        };
        let visited: Vec<Visited> = Visitor::new(&file).collect();
        assert_eq!(visited[0].full_name, ".Solo");
    }
}
