//! Crossing-index geometry and the pairwise precedence decision.
//!
//! Around a node, every touching edge carries a crossing index `0..n`
//! assigned by bearing (see [`Node::calculate_edge_indices`][crate::Node]).
//! A vehicle's turn is the pair `(origin, destination)` of the incoming and
//! leaving edge's indices, and the intersection is treated as a circle of `n`
//! discrete bearings.  Two turns conflict iff their chords intersect.
//!
//! Everything in this module is a pure function of indices, priority levels
//! and flags; node state only enters through the `coin` argument of
//! [`decide`].

use mts_core::{CrossingLogicConfig, EdgeId, NodeId, VehicleId};

use crate::{NetworkError, NetworkResult};

// ── Index geometry ────────────────────────────────────────────────────────────

/// Whether turn A (`origin_a → destination_a`) and turn B cross on a cycle of
/// `total` indices.
///
/// Walking the cycle from `origin_a`: if the first index of B met before
/// `destination_a` is followed by `destination_a` before the other index of
/// B, the chords cross.  A shared destination always conflicts.  Two turns
/// from the same origin only conflict if they also share the destination.
pub fn are_indices_crossing(
    origin_a:      u8,
    destination_a: u8,
    origin_b:      u8,
    destination_b: u8,
    total:         u8,
) -> bool {
    if total == 0 {
        return false;
    }
    if origin_a == origin_b {
        return destination_a == destination_b;
    }

    let mut i = origin_a;
    let mut seen_b = false;
    for _ in 0..2 * total as u16 {
        i = (i + 1) % total;
        if !seen_b {
            if i == origin_b || i == destination_b {
                seen_b = true;
            } else if i == destination_a {
                return false;
            }
        } else if i == destination_a || destination_a == destination_b {
            return true;
        } else if i == origin_b || i == destination_b {
            return false;
        }
    }
    false
}

/// The indices swept by a turn, both ends included, in walking order.
fn swept_indices(origin: u8, destination: u8, total: u8) -> Vec<u8> {
    let mut indices = Vec::with_capacity(total as usize);
    let mut i = origin;
    while i != destination {
        indices.push(i);
        i = (i + 1) % total;
    }
    indices.push(destination);
    indices
}

/// For two crossing turns, the origin index of the turn that has the other
/// one on its left-hand side of the walk (the one that goes first under
/// priority-to-the-right).  `None` if the turns don't cross.
///
/// Both swept index sequences are laid out back to back and compared at
/// every shift; the first index found in both at matching positions is the
/// answer.  The result does not depend on which turn is passed first.
pub fn leftmost_index_in_matching(
    origin_a:      u8,
    destination_a: u8,
    origin_b:      u8,
    destination_b: u8,
    total:         u8,
) -> Option<u8> {
    if !are_indices_crossing(origin_a, destination_a, origin_b, destination_b, total) {
        return None;
    }

    let a = swept_indices(origin_a, destination_a, total);
    let b = swept_indices(origin_b, destination_b, total);
    let n = a.len() + b.len();
    let upper: Vec<Option<u8>> = a.iter().copied().map(Some).chain(b.iter().map(|_| None)).collect();
    let lower: Vec<Option<u8>> = a.iter().map(|_| None).chain(b.iter().copied().map(Some)).collect();

    for shift in 0..n {
        for j in 0..n - shift {
            if let Some(idx) = upper[j] {
                if lower[j + shift] == Some(idx) {
                    return Some(idx);
                }
            }
        }
    }
    None
}

// ── Pairwise decision ─────────────────────────────────────────────────────────

/// An edge touching a node, as the arbiter sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Leg {
    pub edge:     EdgeId,
    /// Crossing index at this node.
    pub index:    u8,
    /// Priority level of the edge; smaller wins.
    pub priority: u8,
}

/// A vehicle registered at a node, reduced to what precedence depends on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Approach {
    /// Waiting at its route's start node to enter `destination`.
    Waiting { vehicle: VehicleId, destination: Leg },
    /// Driving on `origin` towards the node, about to turn into `destination`.
    Arriving { vehicle: VehicleId, origin: Leg, destination: Leg },
}

impl Approach {
    #[inline]
    pub fn vehicle(&self) -> VehicleId {
        match *self {
            Approach::Waiting { vehicle, .. } | Approach::Arriving { vehicle, .. } => vehicle,
        }
    }

    #[inline]
    pub fn destination(&self) -> Leg {
        match *self {
            Approach::Waiting { destination, .. } | Approach::Arriving { destination, .. } => {
                destination
            }
        }
    }

    #[inline]
    pub fn is_spawned(&self) -> bool {
        matches!(self, Approach::Arriving { .. })
    }
}

/// Outcome of comparing vehicle A against vehicle B.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precedence {
    /// A goes before B.
    Wins,
    /// B goes before A.
    Loses,
    /// The turns don't conflict.
    Tie,
}

impl Precedence {
    #[inline]
    pub fn reversed(self) -> Precedence {
        match self {
            Precedence::Wins  => Precedence::Loses,
            Precedence::Loses => Precedence::Wins,
            Precedence::Tie   => Precedence::Tie,
        }
    }

    #[inline]
    fn lower_wins(a: u8, b: u8) -> Option<Precedence> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less    => Some(Precedence::Wins),
            std::cmp::Ordering::Greater => Some(Precedence::Loses),
            std::cmp::Ordering::Equal   => None,
        }
    }
}

/// Decide precedence of `a` over `b` at `node` with `total` crossing indices.
///
/// 1. A waiting vehicle loses to an arriving one; between two waiting
///    vehicles the greater id wins.
/// 2. Two arriving vehicles whose turns don't cross tie.
/// 3. Crossing turns: lower origin priority level wins, then lower
///    destination priority level (both skipped without `edge_priority`).
/// 4. Then right-before-left (left-before-right when driving on the left,
///    which the index orientation already encodes) or, with
///    `priority_to_the_right` off, `coin()`: `true` means A wins.
///
/// Crossing arriving vehicles never tie; if the geometry cannot order them
/// the result is [`NetworkError::GeometryInvariantViolation`].
pub fn decide(
    node:  NodeId,
    a:     &Approach,
    b:     &Approach,
    total: u8,
    rules: &CrossingLogicConfig,
    coin:  impl FnOnce() -> bool,
) -> NetworkResult<Precedence> {
    let (oa, da, ob, db) = match (*a, *b) {
        (Approach::Waiting { vehicle: va, .. }, Approach::Waiting { vehicle: vb, .. }) => {
            return Ok(match va.cmp(&vb) {
                std::cmp::Ordering::Greater => Precedence::Wins,
                std::cmp::Ordering::Less    => Precedence::Loses,
                std::cmp::Ordering::Equal   => Precedence::Tie,
            });
        }
        (Approach::Waiting { .. }, Approach::Arriving { .. }) => return Ok(Precedence::Loses),
        (Approach::Arriving { .. }, Approach::Waiting { .. }) => return Ok(Precedence::Wins),
        (
            Approach::Arriving { origin: oa, destination: da, .. },
            Approach::Arriving { origin: ob, destination: db, .. },
        ) => (oa, da, ob, db),
    };

    if !are_indices_crossing(oa.index, da.index, ob.index, db.index, total) {
        return Ok(Precedence::Tie);
    }

    if rules.edge_priority {
        if let Some(p) = Precedence::lower_wins(oa.priority, ob.priority) {
            return Ok(p);
        }
        if let Some(p) = Precedence::lower_wins(da.priority, db.priority) {
            return Ok(p);
        }
    }

    if !rules.priority_to_the_right {
        return Ok(if coin() { Precedence::Wins } else { Precedence::Loses });
    }

    match leftmost_index_in_matching(oa.index, da.index, ob.index, db.index, total) {
        Some(i) if i == oa.index => Ok(Precedence::Wins),
        Some(i) if i == ob.index => Ok(Precedence::Loses),
        _ => Err(NetworkError::GeometryInvariantViolation {
            node,
            origin_a:      oa.index,
            destination_a: da.index,
            origin_b:      ob.index,
            destination_b: db.index,
        }),
    }
}
