//! Search driver: runs a compiled pattern over a candidate tree.
//!
//! Each node of the searched scope anchors one matching attempt against the
//! sibling run starting there; the sequence matcher requires both sides to
//! exhaust, so the driver shrinks the candidate window from the full tail
//! down to a single node until one attempt succeeds. Successful attempts
//! are snapshotted out of the per-attempt context and deduplicated by a
//! domain-separated fingerprint.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace};

use crate::context::MatchContext;
use crate::handler::match_children;
use crate::matcher::StructuralMatcher;
use crate::node::{NodeId, SourceTree};
use crate::pattern::CompiledPattern;
use crate::result::SubRange;

/// A 256-bit match fingerprint.
///
/// Deterministic across runs: computed over a canonical byte serialization
/// of the snapshot with domain separation and length prefixing.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchFingerprint(pub [u8; 32]);

impl MatchFingerprint {
    /// Creates a fingerprint from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The digest input is `b"TSF:<domain>:v1" || length_prefix(data) ||
    /// data`, with a 64-bit little-endian length prefix.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"TSF:");
        hasher.update(domain);
        hasher.update(b":v1");
        let len = data.len() as u64;
        hasher.update(len.to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for MatchFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatchFingerprint({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// One bound occurrence of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Literal text image, or `None` for an explicitly empty binding.
    pub image: Option<String>,
    /// The bound tree node.
    pub node: Option<NodeId>,
    /// Captured sub-range of the node image.
    pub range: SubRange,
}

/// All occurrences bound under one capture name in a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureBinding {
    /// Capture name.
    pub name: String,
    /// Whether this capture is the externally reportable target.
    pub target: bool,
    /// Ordered occurrences, first to last.
    pub occurrences: Vec<Occurrence>,
}

/// The owned outcome of one successful matching attempt.
///
/// Detached from the per-attempt context, so it outlives the search and
/// serializes for downstream consumers. A capture that matched explicitly
/// empty (zero occurrences allowed and taken) is simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// The node where the matched run starts.
    pub anchor: NodeId,
    /// Bindings keyed by capture name, in result-tree order.
    pub captures: Vec<CaptureBinding>,
}

impl MatchSnapshot {
    /// Looks up the binding recorded under `name`.
    pub fn binding(&self, name: &str) -> Option<&CaptureBinding> {
        self.captures.iter().find(|c| c.name == name)
    }

    /// Number of occurrences bound under `name` (0 when absent).
    pub fn occurrence_count(&self, name: &str) -> usize {
        self.binding(name).map_or(0, |c| c.occurrences.len())
    }

    /// The first target binding, if the pattern marked one.
    pub fn find_target(&self) -> Option<&CaptureBinding> {
        self.captures.iter().find(|c| c.target)
    }

    /// Canonical fingerprint of this snapshot.
    pub fn fingerprint(&self) -> MatchFingerprint {
        let mut data = Vec::new();
        push_u32(&mut data, self.anchor.as_u32());
        push_u64(&mut data, self.captures.len() as u64);
        for capture in &self.captures {
            push_bytes(&mut data, capture.name.as_bytes());
            data.push(u8::from(capture.target));
            push_u64(&mut data, capture.occurrences.len() as u64);
            for occ in &capture.occurrences {
                match &occ.image {
                    Some(image) => {
                        data.push(1);
                        push_bytes(&mut data, image.as_bytes());
                    }
                    None => data.push(0),
                }
                match occ.node {
                    Some(node) => {
                        data.push(1);
                        push_u32(&mut data, node.as_u32());
                    }
                    None => data.push(0),
                }
                push_u64(&mut data, occ.range.start as u64);
                push_u64(&mut data, occ.range.end.map_or(u64::MAX, |e| e as u64));
            }
        }
        MatchFingerprint::hash_with_domain(b"match", &data)
    }
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    push_u64(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Runs one compiled pattern over candidate trees.
///
/// Holds no per-attempt state; one searcher may serve any number of
/// searches over any number of trees.
pub struct Searcher<'p> {
    pattern: &'p CompiledPattern,
    matcher: &'p dyn StructuralMatcher,
}

impl<'p> Searcher<'p> {
    /// Creates a searcher for the pattern.
    pub fn new(pattern: &'p CompiledPattern, matcher: &'p dyn StructuralMatcher) -> Self {
        Self { pattern, matcher }
    }

    /// Finds every match anchored within the subtree rooted at `scope`.
    ///
    /// At most one match is reported per anchor node (the longest window
    /// that succeeds there); identical snapshots reached through different
    /// anchors are deduplicated by fingerprint.
    pub fn find_all(&self, tree: &SourceTree, scope: NodeId) -> Vec<MatchSnapshot> {
        let mut ctx = MatchContext::new(tree, self.matcher, self.pattern.capture_count());
        let mut seen: HashSet<MatchFingerprint> = HashSet::new();
        let mut out = Vec::new();

        for anchor in tree.preorder(scope) {
            if let Some(snapshot) = self.attempt_at(tree, anchor, scope, &mut ctx) {
                let fingerprint = snapshot.fingerprint();
                if seen.insert(fingerprint) {
                    trace!(%fingerprint, anchor = %snapshot.anchor, "match found");
                    out.push(snapshot);
                }
            }
        }

        debug!(scope = %scope, matches = out.len(), "search finished");
        out
    }

    /// Finds the first match anchored within the subtree rooted at `scope`.
    pub fn find_first(&self, tree: &SourceTree, scope: NodeId) -> Option<MatchSnapshot> {
        let mut ctx = MatchContext::new(tree, self.matcher, self.pattern.capture_count());
        tree.preorder(scope)
            .into_iter()
            .find_map(|anchor| self.attempt_at(tree, anchor, scope, &mut ctx))
    }

    /// Attempts the pattern at one anchor, shrinking the candidate window
    /// from the whole sibling tail down to the anchor alone.
    ///
    /// The scope root anchors a single-node run; any other node anchors
    /// the run from itself to the end of its parent's children. Anchors
    /// the pattern's coarse strategy rejects are skipped outright.
    fn attempt_at(
        &self,
        tree: &SourceTree,
        anchor: NodeId,
        scope: NodeId,
        ctx: &mut MatchContext<'_>,
    ) -> Option<MatchSnapshot> {
        if !self.pattern.strategy().admits(tree.kind(anchor)) {
            return None;
        }
        let single = [anchor];
        let run: &[NodeId] = if anchor == scope {
            &single
        } else {
            match tree.parent(anchor) {
                Some(parent) => {
                    let siblings = tree.children(parent);
                    let start = siblings
                        .iter()
                        .position(|&n| n == anchor)
                        .unwrap_or(siblings.len());
                    &siblings[start..]
                }
                None => &single,
            }
        };
        for end in (1..=run.len()).rev() {
            ctx.reset();
            if match_children(self.pattern, self.pattern.roots(), &run[..end], ctx) {
                return Some(snapshot_of(ctx, anchor));
            }
        }
        None
    }
}

/// Copies the result tree of a successful attempt into an owned snapshot.
fn snapshot_of(ctx: &MatchContext<'_>, anchor: NodeId) -> MatchSnapshot {
    let results = ctx.results();
    let root = ctx.root_result();
    let captures = results
        .get(root)
        .sons()
        .iter()
        .map(|&son| {
            let r = results.get(son);
            let occurrences = if r.has_sons() {
                r.sons().iter().map(|&s| occurrence_of(ctx, s)).collect()
            } else {
                vec![occurrence_of(ctx, son)]
            };
            CaptureBinding {
                name: r.name().to_string(),
                target: r.is_target(),
                occurrences,
            }
        })
        .collect();
    MatchSnapshot { anchor, captures }
}

fn occurrence_of(ctx: &MatchContext<'_>, id: crate::result::MatchResultId) -> Occurrence {
    let r = ctx.results().get(id);
    Occurrence {
        image: r.image().map(str::to_string),
        node: r.node(),
        range: r.range(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DefaultStructuralMatcher;
    use crate::node::NodeKind;
    use crate::pattern::{CaptureSpec, PatternBuilder};

    static MATCHER: DefaultStructuralMatcher = DefaultStructuralMatcher;

    fn call_pattern() -> crate::pattern::CompiledPattern {
        // f($arg$): a composite literal carries the callee as a child.
        let mut b = PatternBuilder::new();
        let call = b.literal(NodeKind::Call, "");
        b.literal_in(call, NodeKind::Identifier, "f");
        b.capture_in(call, CaptureSpec::new("arg").target());
        b.build().unwrap()
    }

    /// Adds a one-argument call node with its callee identifier child.
    fn add_call(tree: &mut SourceTree, parent: NodeId, callee: &str, arg: &str) -> (NodeId, NodeId) {
        let call = tree.add_node(NodeKind::Call, "", Some(parent));
        tree.add_node(NodeKind::Identifier, callee, Some(call));
        let arg = tree.add_node(NodeKind::Expression, arg, Some(call));
        (call, arg)
    }

    #[test]
    fn finds_every_matching_subtree_in_scope() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let (f1, a1) = add_call(&mut tree, root, "f", "a");
        add_call(&mut tree, root, "g", "b");
        let (f2, c) = add_call(&mut tree, root, "f", "c");

        let pattern = call_pattern();
        let searcher = Searcher::new(&pattern, &MATCHER);
        let matches = searcher.find_all(&tree, root);

        // Both f(...) calls and neither g nor any leaf.
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].anchor, f1);
        assert_eq!(matches[1].anchor, f2);

        let target = matches[0].find_target().unwrap();
        assert_eq!(target.name, "arg");
        assert_eq!(target.occurrences[0].node, Some(a1));
        assert_eq!(
            matches[1].find_target().unwrap().occurrences[0].node,
            Some(c)
        );
    }

    #[test]
    fn scope_confines_the_search() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let left = tree.add_node(NodeKind::Class, "Left", Some(root));
        let (f1, _) = add_call(&mut tree, left, "f", "a");
        let right = tree.add_node(NodeKind::Class, "Right", Some(root));
        add_call(&mut tree, right, "f", "b");

        let pattern = call_pattern();
        let searcher = Searcher::new(&pattern, &MATCHER);
        assert_eq!(searcher.find_all(&tree, root).len(), 2);
        let confined = searcher.find_all(&tree, left);
        assert_eq!(confined.len(), 1);
        assert_eq!(confined[0].anchor, f1);
    }

    #[test]
    fn window_shrinks_past_trailing_siblings() {
        let mut b = PatternBuilder::new();
        b.literal(NodeKind::Statement, "a");
        b.literal(NodeKind::Statement, "b");
        let pattern = b.build().unwrap();

        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let a = tree.add_node(NodeKind::Statement, "a", Some(root));
        tree.add_node(NodeKind::Statement, "b", Some(root));
        tree.add_node(NodeKind::Statement, "c", Some(root));

        let searcher = Searcher::new(&pattern, &MATCHER);
        let matches = searcher.find_all(&tree, root);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].anchor, a);
    }

    #[test]
    fn find_first_stops_at_the_earliest_anchor() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let (f1, _) = add_call(&mut tree, root, "f", "a");
        add_call(&mut tree, root, "f", "b");

        let pattern = call_pattern();
        let searcher = Searcher::new(&pattern, &MATCHER);
        let first = searcher.find_first(&tree, root).unwrap();
        assert_eq!(first.anchor, f1);
    }

    #[test]
    fn quantified_search_reports_every_occurrence() {
        let mut b = PatternBuilder::new();
        let call = b.literal(NodeKind::Call, "");
        b.literal_in(call, NodeKind::Identifier, "f");
        b.capture_in(call, CaptureSpec::new("args").at_least(1).target());
        let pattern = b.build().unwrap();

        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let f = tree.add_node(NodeKind::Call, "", Some(root));
        tree.add_node(NodeKind::Identifier, "f", Some(f));
        for t in ["x", "y", "z"] {
            tree.add_node(NodeKind::Expression, t, Some(f));
        }

        let searcher = Searcher::new(&pattern, &MATCHER);
        let matches = searcher.find_all(&tree, root);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].occurrence_count("args"), 3);
        let images: Vec<_> = matches[0].binding("args").unwrap()
            .occurrences
            .iter()
            .map(|o| o.image.as_deref().unwrap())
            .collect();
        assert_eq!(images, ["x", "y", "z"]);
    }

    #[test]
    fn repeated_searches_are_idempotent() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        add_call(&mut tree, root, "f", "a");

        let pattern = call_pattern();
        let searcher = Searcher::new(&pattern, &MATCHER);
        let first = searcher.find_all(&tree, root);
        let second = searcher.find_all(&tree, root);
        assert_eq!(first, second);
        assert_eq!(
            first[0].fingerprint(),
            second[0].fingerprint(),
        );
    }

    #[test]
    fn fingerprint_is_domain_separated_and_deterministic() {
        let a = MatchFingerprint::hash_with_domain(b"match", b"payload");
        let b = MatchFingerprint::hash_with_domain(b"match", b"payload");
        let c = MatchFingerprint::hash_with_domain(b"other", b"payload");
        let d = MatchFingerprint::hash_with_domain(b"match", b"payloae");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn snapshot_serializes_for_downstream_consumers() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        add_call(&mut tree, root, "f", "a");

        let pattern = call_pattern();
        let searcher = Searcher::new(&pattern, &MATCHER);
        let matches = searcher.find_all(&tree, root);

        let json = serde_json::to_string(&matches[0]).unwrap();
        let restored: MatchSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, matches[0]);
        assert_eq!(restored.fingerprint(), matches[0].fingerprint());
    }

    #[test]
    fn snapshot_absent_capture_counts_zero() {
        let mut b = PatternBuilder::new();
        b.capture(CaptureSpec::new("x").occurs(0, 2));
        b.literal(NodeKind::Statement, ";");
        let pattern = b.build().unwrap();

        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        tree.add_node(NodeKind::Statement, ";", Some(root));

        let searcher = Searcher::new(&pattern, &MATCHER);
        let matches = searcher.find_all(&tree, root);
        assert!(!matches.is_empty());
        assert_eq!(matches[0].occurrence_count("x"), 0);
        assert!(matches[0].binding("x").is_none());
    }
}
