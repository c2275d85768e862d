use std::collections::{BTreeMap, BTreeSet, VecDeque};
use serde::Serialize;

use simplevm::decoder::{Decoded, Op};
use simplevm::disasm::{branch_target, fmt_decoded};

use crate::model::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind { Fallthrough, Branch, CondBranch, Call }

impl EdgeKind {
    pub fn short(self) -> &'static str {
        match self { EdgeKind::Fallthrough => "ft", EdgeKind::Branch => "br", EdgeKind::CondBranch => "cbr", EdgeKind::Call => "call" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge { pub from: usize, pub to: i64, pub kind: EdgeKind }

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub visited: BTreeSet<usize>,
    pub edges: Vec<Edge>,
    /// Halting instructions: `hlt` and `retn`.
    pub exits: BTreeSet<usize>,
}

/// Walks control flow from `entries`. Jump and call targets that do not land
/// on an instruction boundary are recorded as edges but not followed.
pub fn analyze_entries(img: &Image, entries: &[usize], max_instr: usize) -> Analysis {
    let mut out = Analysis::default();
    let mut queue: VecDeque<usize> = entries.iter().copied().filter(|&e| img.is_boundary(e)).collect();
    while let Some(at) = queue.pop_front() {
        if out.visited.len() >= max_instr { break; }
        if !out.visited.insert(at) { continue; }
        let Some(d) = img.decode(at) else { continue };
        let ft = at + d.width();
        let follow = |to: usize, queue: &mut VecDeque<usize>| {
            if img.is_boundary(to) { queue.push_back(to); }
        };
        let to = raw_target(&d);
        let target = usize::try_from(to).ok();
        match d.op {
            Op::Jmp => {
                out.edges.push(Edge { from: at, to, kind: EdgeKind::Branch });
                if let Some(t) = target { follow(t, &mut queue); }
            }
            Op::Je | Op::Jne | Op::Jg | Op::Jb => {
                out.edges.push(Edge { from: at, to, kind: EdgeKind::CondBranch });
                if let Some(t) = target { follow(t, &mut queue); }
                out.edges.push(Edge { from: at, to: ft as i64, kind: EdgeKind::Fallthrough });
                follow(ft, &mut queue);
            }
            Op::Call => {
                out.edges.push(Edge { from: at, to, kind: EdgeKind::Call });
                if let Some(t) = target { follow(t, &mut queue); }
                out.edges.push(Edge { from: at, to: ft as i64, kind: EdgeKind::Fallthrough });
                follow(ft, &mut queue);
            }
            Op::Halt | Op::Retn => {
                out.exits.insert(at);
            }
            _ => {
                if ft < img.len() {
                    out.edges.push(Edge { from: at, to: ft as i64, kind: EdgeKind::Fallthrough });
                    follow(ft, &mut queue);
                }
            }
        }
    }
    out
}

/// Destination index of a jump or call, possibly outside the program.
fn raw_target(d: &Decoded) -> i64 {
    match d.op {
        Op::Call => i64::from(d.a) + 1,
        _ => d.at as i64 + i64::from(d.a),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelKV { pub index: usize, pub name: String }

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub index: usize,
    pub words: Vec<i32>,
    pub text: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeOut { pub from: usize, pub to: i64, pub kind: &'static str }

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub entries: Vec<usize>,
    pub listing: Vec<Line>,
    pub edges: Vec<EdgeOut>,
    pub labels: Vec<LabelKV>,
    /// Jump or call targets that are not instruction boundaries.
    pub bad_targets: Vec<EdgeOut>,
    /// Instruction starts never reached from the entries.
    pub unreachable: Vec<usize>,
}

/// Synthetic names: `sub_` for call targets, `loc_` for branch targets.
pub fn synth_labels(img: &Image, analysis: &Analysis, entries: &[usize]) -> BTreeMap<usize, String> {
    let mut labels = BTreeMap::new();
    for e in &analysis.edges {
        let Ok(to) = usize::try_from(e.to) else { continue };
        if !img.is_boundary(to) { continue; }
        match e.kind {
            EdgeKind::Call => { labels.insert(to, format!("sub_{to:04x}")); }
            EdgeKind::Branch | EdgeKind::CondBranch => { labels.entry(to).or_insert_with(|| format!("loc_{to:04x}")); }
            EdgeKind::Fallthrough => {}
        }
    }
    for &e in entries { labels.entry(e).or_insert_with(|| format!("entry_{e:04x}")); }
    labels
}

pub fn build_report(img: &Image, entries: &[usize], max_instr: usize) -> Report {
    let analysis = analyze_entries(img, entries, max_instr);
    let labels = synth_labels(img, &analysis, entries);

    let mut listing = Vec::new();
    let mut at = 0;
    while at < img.len() {
        let (width, mut text) = match img.decode(at) {
            Some(d) => {
                let mut text = fmt_decoded(&d);
                if let Some(name) = branch_target(&d).and_then(|t| labels.get(&t)) {
                    text.push_str(&format!(" <{name}>"));
                }
                (d.width(), text)
            }
            None => (1, format!(".word {:#x}", img.words()[at])),
        };
        if !analysis.visited.contains(&at) && img.is_boundary(at) {
            text.push_str("  ; unreachable");
        }
        let end = (at + width).min(img.len());
        listing.push(Line { index: at, words: img.words()[at..end].to_vec(), text, label: labels.get(&at).cloned() });
        at = end;
    }

    let edge_out = |e: &Edge| EdgeOut { from: e.from, to: e.to, kind: e.kind.short() };
    let bad_targets = analysis
        .edges
        .iter()
        .filter(|e| e.kind != EdgeKind::Fallthrough)
        .filter(|e| !usize::try_from(e.to).is_ok_and(|t| img.is_boundary(t)))
        .map(edge_out)
        .collect();
    let unreachable = (0..img.len()).filter(|&i| img.is_boundary(i) && !analysis.visited.contains(&i)).collect();

    Report {
        entries: entries.to_vec(),
        listing,
        edges: analysis.edges.iter().map(edge_out).collect(),
        labels: labels.into_iter().map(|(index, name)| LabelKV { index, name }).collect(),
        bad_targets,
        unreachable,
    }
}
