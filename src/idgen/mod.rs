//! Sequential human-readable identifiers.
//!
//! Every entity class draws numbers from its own namespace: companies from
//! `C`, branches from `B`, assets from `A`, data center logs from `DC`, and
//! tickets from either `{branch prefix}-NNN` or the dash-less `TNNN`
//! fallback. Numbers are compared numerically (`C9` precedes `C10`), padded
//! to three digits, and grow wider past 999.
//!
//! Counters live in the `id_sequences` table and advance with an atomic
//! upsert. A namespace with no counter row yet is seeded from the largest
//! identifier already present, so pre-existing data continues its sequence.
//! Generation and insertion are not atomic: the unique constraint on the id
//! column is the authoritative collision signal, and creation endpoints
//! retry with a fresh number up to [`INSERT_ATTEMPTS`] times.

use diesel::prelude::*;
use diesel::PgConnection;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::shared::schema::id_sequences;

/// Attempt budget for a generate-then-insert loop.
pub const INSERT_ATTEMPTS: usize = 5;

static DASHED_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)$").unwrap());

/// One identifier namespace: a prefix plus its rendering shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    key: String,
    prefix: String,
    dashed: bool,
}

impl Namespace {
    /// Plain entity namespace, rendered `{prefix}NNN`.
    pub fn plain(prefix: &str) -> Self {
        Self {
            key: prefix.to_string(),
            prefix: prefix.to_string(),
            dashed: false,
        }
    }

    /// Ticket namespace for a branch. A configured branch prefix renders
    /// `{prefix}-NNN`; branches without one share the dash-less `TNNN`
    /// space. The two spaces are disjoint by construction: the dashed
    /// parser requires the dash, the plain parser rejects it.
    pub fn ticket(branch_prefix: Option<&str>) -> Self {
        match branch_prefix {
            Some(prefix) if !prefix.is_empty() => Self {
                key: format!("ticket:{prefix}"),
                prefix: prefix.to_string(),
                dashed: true,
            },
            _ => Self {
                key: "ticket:T".to_string(),
                prefix: "T".to_string(),
                dashed: false,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// SQL LIKE pattern selecting candidate identifiers for seeding scans.
    pub fn like_pattern(&self) -> String {
        if self.dashed {
            format!("{}-%", self.prefix)
        } else {
            format!("{}%", self.prefix)
        }
    }

    pub fn format(&self, n: i64) -> String {
        if self.dashed {
            format!("{}-{:03}", self.prefix, n)
        } else {
            format!("{}{:03}", self.prefix, n)
        }
    }

    /// Extract the sequence number an identifier holds in this namespace,
    /// or None when the identifier belongs to a different namespace.
    pub fn parse(&self, id: &str) -> Option<i64> {
        if self.dashed {
            let rest = id.strip_prefix(&self.prefix)?;
            if !rest.starts_with('-') {
                return None;
            }
            DASHED_TAIL
                .captures(id)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        } else {
            let rest = id.strip_prefix(&self.prefix)?;
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            rest.parse().ok()
        }
    }

    /// Numerically largest sequence number among existing identifiers.
    pub fn seed_from<'a, I>(&self, ids: I) -> i64
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter_map(|id| self.parse(id))
            .max()
            .unwrap_or(0)
    }
}

/// Draw the next number for a namespace. `seed` computes the current maximum
/// from existing rows and only runs when the counter row does not exist yet.
pub fn reserve<F>(conn: &mut PgConnection, ns: &Namespace, seed: F) -> QueryResult<i64>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<i64>,
{
    let current: Option<i64> = id_sequences::table
        .find(ns.key())
        .select(id_sequences::last_value)
        .first(conn)
        .optional()?;

    let start = match current {
        Some(_) => 0,
        None => seed(conn)?,
    };

    diesel::insert_into(id_sequences::table)
        .values((
            id_sequences::namespace.eq(ns.key()),
            id_sequences::last_value.eq(start + 1),
        ))
        .on_conflict(id_sequences::namespace)
        .do_update()
        .set(id_sequences::last_value.eq(id_sequences::last_value + 1))
        .returning(id_sequences::last_value)
        .get_result(conn)
}

/// Convenience wrapper: reserve a number and render it.
pub fn next_id<F>(conn: &mut PgConnection, ns: &Namespace, seed: F) -> QueryResult<String>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<i64>,
{
    let n = reserve(conn, ns, seed)?;
    Ok(ns.format(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits_and_grows() {
        let ns = Namespace::plain("C");
        assert_eq!(ns.format(1), "C001");
        assert_eq!(ns.format(42), "C042");
        assert_eq!(ns.format(999), "C999");
        assert_eq!(ns.format(1000), "C1000");
    }

    #[test]
    fn prefixed_tickets_render_with_dash() {
        let ns = Namespace::ticket(Some("HQ"));
        assert_eq!(ns.format(10), "HQ-010");
        assert_eq!(ns.parse("HQ-009"), Some(9));
    }

    #[test]
    fn fallback_tickets_render_without_dash() {
        let ns = Namespace::ticket(None);
        assert_eq!(ns.format(100), "T100");
        assert_eq!(ns.parse("T099"), Some(99));
    }

    #[test]
    fn empty_branch_prefix_falls_back() {
        assert_eq!(Namespace::ticket(Some("")), Namespace::ticket(None));
    }

    #[test]
    fn comparison_is_numeric_not_lexicographic() {
        // Lexicographically "C9" > "C10"; the seed must still be 10.
        let ns = Namespace::plain("C");
        assert_eq!(ns.seed_from(["C9", "C10"]), 10);
        assert_eq!(ns.format(ns.seed_from(["C9"]) + 1), "C010");
    }

    #[test]
    fn ticket_namespaces_are_disjoint() {
        let prefixed = Namespace::ticket(Some("HQ"));
        let fallback = Namespace::ticket(None);
        // A dashed id never counts toward the fallback space.
        assert_eq!(fallback.parse("T-028"), None);
        assert_eq!(fallback.parse("HQ-028"), None);
        // A plain id never counts toward a prefixed space.
        assert_eq!(prefixed.parse("T028"), None);
        assert_eq!(prefixed.parse("HQ028"), None);
        // Prefix overlap between branches stays separate too.
        let hq2 = Namespace::ticket(Some("HQ2"));
        assert_eq!(prefixed.parse("HQ2-005"), None);
        assert_eq!(hq2.parse("HQ2-005"), Some(5));
    }

    #[test]
    fn seed_ignores_foreign_ids() {
        let ns = Namespace::ticket(Some("HQ"));
        assert_eq!(ns.seed_from(["HQ-009", "T099", "BKK-050", "HQ-00x"]), 9);
        assert_eq!(ns.format(10), "HQ-010");
    }

    #[test]
    fn empty_namespace_starts_at_one() {
        let ns = Namespace::ticket(Some("BKK"));
        assert_eq!(ns.seed_from([]), 0);
        assert_eq!(ns.format(ns.seed_from([]) + 1), "BKK-001");
    }

    #[test]
    fn sequence_is_gapless_and_increasing() {
        let ns = Namespace::plain("A");
        let mut last = ns.seed_from(["A007"]);
        let ids: Vec<String> = (0..5)
            .map(|_| {
                last += 1;
                ns.format(last)
            })
            .collect();
        assert_eq!(ids, ["A008", "A009", "A010", "A011", "A012"]);
    }
}
