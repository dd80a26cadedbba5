use crate::aabb::Aabb;
use crate::config::BroadPhaseKind;

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf(usize),
    Branch(usize, usize),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    aabb: Aabb,
    kind: NodeKind,
}

#[derive(Debug, Default)]
pub struct BroadPhase {
    kind: BroadPhaseKind,
    order: Vec<usize>,
    nodes: Vec<Node>,
    stack: Vec<usize>,
}

impl BroadPhase {
    pub fn new(kind: BroadPhaseKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> BroadPhaseKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: BroadPhaseKind) {
        self.kind = kind;
    }

    /// Fills `pairs` with every `(a, b)`, `a < b`, whose bounds overlap and
    /// that `accept` lets through, sorted so every strategy yields the same
    /// order.
    pub fn find_pairs(
        &mut self,
        aabbs: &[Aabb],
        mut accept: impl FnMut(usize, usize) -> bool,
        pairs: &mut Vec<(usize, usize)>,
    ) {
        pairs.clear();
        if aabbs.len() < 2 {
            return;
        }
        let mut emit = |a: usize, b: usize| {
            let pair = if a < b { (a, b) } else { (b, a) };
            if accept(pair.0, pair.1) {
                pairs.push(pair);
            }
        };
        match self.kind {
            BroadPhaseKind::BruteForce => brute_force(aabbs, &mut emit),
            BroadPhaseKind::SweepAndPrune => sweep_and_prune(aabbs, &mut self.order, &mut emit),
            BroadPhaseKind::Tree => {
                self.order.clear();
                self.order.extend(0..aabbs.len());
                self.nodes.clear();
                let root = build(aabbs, &mut self.order, &mut self.nodes);
                for a in 0..aabbs.len() {
                    query(&self.nodes, root, a, &aabbs[a], &mut self.stack, &mut emit);
                }
            }
        }
        pairs.sort_unstable();
    }
}

fn brute_force(aabbs: &[Aabb], emit: &mut impl FnMut(usize, usize)) {
    for a in 0..aabbs.len() {
        for b in a + 1..aabbs.len() {
            if aabbs[a].overlaps(&aabbs[b]) {
                emit(a, b);
            }
        }
    }
}

fn sweep_and_prune(aabbs: &[Aabb], order: &mut Vec<usize>, emit: &mut impl FnMut(usize, usize)) {
    order.clear();
    order.extend(0..aabbs.len());
    order.sort_unstable_by(|&a, &b| aabbs[a].min.x.total_cmp(&aabbs[b].min.x));

    for (i, &a) in order.iter().enumerate() {
        let box_a = &aabbs[a];
        for &b in &order[i + 1..] {
            let box_b = &aabbs[b];
            if box_b.min.x > box_a.max.x {
                break;
            }
            if box_a.min.y <= box_b.max.y && box_a.max.y >= box_b.min.y {
                emit(a, b);
            }
        }
    }
}

/// Top-down median split on the longest axis of the centers' spread.
fn build(aabbs: &[Aabb], items: &mut [usize], nodes: &mut Vec<Node>) -> usize {
    if let [only] = items {
        nodes.push(Node {
            aabb: aabbs[*only],
            kind: NodeKind::Leaf(*only),
        });
        return nodes.len() - 1;
    }

    let bounds = items
        .iter()
        .skip(1)
        .fold(aabbs[items[0]], |acc, &i| acc.merged(&aabbs[i]));
    let spread = items
        .iter()
        .map(|&i| aabbs[i].center())
        .fold(Aabb::new(aabbs[items[0]].center(), aabbs[items[0]].center()), |acc, c| {
            acc.merged(&Aabb::new(c, c))
        })
        .extents();
    let along_x = spread.x >= spread.y;

    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |&a, &b| {
        let (ca, cb) = (aabbs[a].center(), aabbs[b].center());
        if along_x {
            ca.x.total_cmp(&cb.x)
        } else {
            ca.y.total_cmp(&cb.y)
        }
    });
    let (left_items, right_items) = items.split_at_mut(mid);
    let left = build(aabbs, left_items, nodes);
    let right = build(aabbs, right_items, nodes);
    nodes.push(Node {
        aabb: bounds,
        kind: NodeKind::Branch(left, right),
    });
    nodes.len() - 1
}

/// Emits every leaf above `a` whose bounds overlap `aabb`.
fn query(
    nodes: &[Node],
    root: usize,
    a: usize,
    aabb: &Aabb,
    stack: &mut Vec<usize>,
    emit: &mut impl FnMut(usize, usize),
) {
    stack.clear();
    stack.push(root);
    while let Some(n) = stack.pop() {
        let node = &nodes[n];
        if !node.aabb.overlaps(aabb) {
            continue;
        }
        match node.kind {
            NodeKind::Leaf(b) => {
                if b > a {
                    emit(a, b);
                }
            }
            NodeKind::Branch(left, right) => {
                stack.push(left);
                stack.push(right);
            }
        }
    }
}
