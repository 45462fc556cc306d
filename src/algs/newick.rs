//! Bracket-notation (Newick) serialization.
//!
//! The writer emits leaf names, nesting parentheses, and optional `:length`
//! annotations; internal node names are not written. The reader is a
//! convenience that turns a bracket string back into the [`RawTopology`]
//! node/edge structure the engine ingests, generating fresh identifiers for
//! unnamed internal vertices.

use std::collections::HashSet;

use crate::topology::graph::{RawTopology, TreeGraph};
use crate::tree_error::LineageTreeError;

/// Characters that terminate a label.
const LABEL_DELIMITERS: &[u8] = b"(),:; \t\r\n";

/// Reserved list separator; identifiers containing it cannot be serialized
/// without corrupting the format.
pub const SEPARATOR: char = ',';

/// Serialize the tree below `root` to a bracket-notation string.
///
/// # Errors
/// `ReservedCharacter` if any node identifier contains the separator, since
/// the emitted string would silently describe a different (wrong) tree.
pub(crate) fn to_newick(
    graph: &TreeGraph,
    root: &str,
    record_branch_lengths: bool,
) -> Result<String, LineageTreeError> {
    for node in graph.node_order() {
        if node.contains(SEPARATOR) {
            return Err(LineageTreeError::ReservedCharacter(node.clone()));
        }
    }

    // Build each node's fragment bottom-up over a postorder walk.
    let postorder = crate::topology::traversal::postorder_nodes(graph, root);
    let mut fragment: std::collections::HashMap<&str, String> =
        std::collections::HashMap::with_capacity(postorder.len());
    for node in &postorder {
        let mut s = String::new();
        let children = graph.children_with_lengths(node);
        if children.is_empty() {
            s.push_str(node);
        } else {
            s.push('(');
            for (i, (child, _)) in children.iter().enumerate() {
                if i > 0 {
                    s.push(SEPARATOR);
                }
                s.push_str(&fragment[child.as_str()]);
            }
            s.push(')');
        }
        if record_branch_lengths {
            if let Some(parent) = graph.parent_of(node) {
                let length = graph.edge_length(parent, node).unwrap_or_default();
                s.push(':');
                s.push_str(&format_length(length));
            }
        }
        fragment.insert(node.as_str(), s);
    }
    Ok(format!("{};", fragment[root]))
}

fn format_length(length: f64) -> String {
    // Trim the trailing ".0" of integral lengths the way most writers do.
    if length.fract() == 0.0 && length.abs() < 1e15 {
        format!("{}", length as i64)
    } else {
        format!("{length}")
    }
}

impl RawTopology {
    /// Parse a bracket-notation string into the node/edge form the engine
    /// consumes. Unnamed internal vertices (and unnamed leaves) receive
    /// generated identifiers that avoid every named vertex.
    ///
    /// # Errors
    /// `MalformedNewick` with the byte position of the first defect.
    pub fn from_newick(input: &str) -> Result<Self, LineageTreeError> {
        Parser::new(input).parse()
    }
}

/// A finished subtree waiting to be attached to its parent.
struct Finished {
    name: String,
    length: Option<f64>,
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    raw: RawTopology,
    used: HashSet<String>,
    counter: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
            raw: RawTopology::default(),
            used: HashSet::new(),
            counter: 0,
        }
    }

    fn parse(mut self) -> Result<RawTopology, LineageTreeError> {
        // Stack of open internal vertices: the children collected so far.
        let mut open: Vec<Vec<Finished>> = Vec::new();
        let mut finished: Option<Finished> = None;

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'(') => {
                    if finished.is_some() {
                        return self.fail("unexpected `(` after a subtree");
                    }
                    self.pos += 1;
                    open.push(Vec::new());
                }
                Some(b',') => {
                    self.pos += 1;
                    let done = finished
                        .take()
                        .ok_or_else(|| self.error("`,` without a preceding subtree"))?;
                    let group = open
                        .last_mut()
                        .ok_or_else(|| self.error("`,` outside parentheses"))?;
                    group.push(done);
                }
                Some(b')') => {
                    self.pos += 1;
                    let done = finished
                        .take()
                        .ok_or_else(|| self.error("empty subtree before `)`"))?;
                    let mut group = open
                        .pop()
                        .ok_or_else(|| self.error("unmatched `)`"))?;
                    group.push(done);
                    let (label, length) = self.read_label_and_length()?;
                    let name = match label {
                        Some(name) => self.claim(name)?,
                        None => self.generate_name(),
                    };
                    self.raw.add_node(name.clone());
                    for child in group {
                        self.raw
                            .add_edge(name.clone(), child.name, child.length);
                    }
                    finished = Some(Finished { name, length });
                }
                Some(b';') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    if finished.is_some() {
                        return self.fail("expected `,`, `)`, or `;`");
                    }
                    let (label, length) = self.read_label_and_length()?;
                    let name = match label {
                        Some(name) => self.claim(name)?,
                        None => self.generate_name(),
                    };
                    self.raw.add_node(name.clone());
                    finished = Some(Finished { name, length });
                }
                None => return self.fail("unterminated newick string (missing `;`)"),
            }
        }

        if !open.is_empty() {
            return self.fail("unmatched `(`");
        }
        self.skip_whitespace();
        if self.peek().is_some() {
            return self.fail("trailing input after `;`");
        }
        if finished.is_none() {
            return self.fail("empty newick string");
        }
        Ok(self.raw)
    }

    fn read_label_and_length(
        &mut self,
    ) -> Result<(Option<String>, Option<f64>), LineageTreeError> {
        let label = self.read_label();
        let mut length = None;
        self.skip_whitespace();
        if self.peek() == Some(b':') {
            self.pos += 1;
            length = Some(self.read_length()?);
        }
        Ok((label, length))
    }

    fn read_label(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if LABEL_DELIMITERS.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            None
        } else {
            Some(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
        }
    }

    fn read_length(&mut self) -> Result<f64, LineageTreeError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        text.parse::<f64>()
            .map_err(|_| self.error("expected a branch length"))
    }

    fn claim(&mut self, name: String) -> Result<String, LineageTreeError> {
        if !self.used.insert(name.clone()) {
            return Err(self.error(&format!("duplicate vertex label `{name}`")));
        }
        Ok(name)
    }

    fn generate_name(&mut self) -> String {
        loop {
            let candidate = format!("node{}", self.counter);
            self.counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> LineageTreeError {
        LineageTreeError::MalformedNewick {
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn fail<T>(&self, reason: &str) -> Result<T, LineageTreeError> {
        Err(self.error(reason))
    }
}
