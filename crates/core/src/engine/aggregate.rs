use crate::domain::profile::Holding;
use crate::domain::report::AggregatedHolding;
use std::collections::HashMap;

/// Folds each ETF's holdings into one portfolio-wide exposure table.
///
/// `rows` pairs an ETF's allocation percentage with its holdings; an empty
/// holdings vector contributes nothing. Holdings sharing a name across ETFs
/// accumulate. Output is sorted descending by weighted percent; the sort is
/// stable, so ties keep first-seen order and identical inputs always produce
/// identical output.
pub fn aggregate_exposures(rows: &[(f64, Vec<Holding>)]) -> Vec<AggregatedHolding> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<AggregatedHolding> = Vec::new();

    for (allocation, holdings) in rows {
        for holding in holdings {
            let weighted = holding.weight_pct * (allocation / 100.0);
            match index.get(&holding.name) {
                Some(&i) => out[i].weighted_percent += weighted,
                None => {
                    index.insert(holding.name.clone(), out.len());
                    out.push(AggregatedHolding {
                        holding_name: holding.name.clone(),
                        weighted_percent: weighted,
                    });
                }
            }
        }
    }

    out.sort_by(|a, b| {
        b.weighted_percent
            .partial_cmp(&a.weighted_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(name: &str, weight_pct: f64) -> Holding {
        Holding {
            name: name.to_string(),
            weight_pct,
        }
    }

    #[test]
    fn single_etf_at_full_allocation_passes_weights_through() {
        let rows = vec![(
            100.0,
            vec![holding("TSMC", 47.3), holding("MediaTek", 4.5)],
        )];
        let out = aggregate_exposures(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].holding_name, "TSMC");
        assert_eq!(out[0].weighted_percent, 47.3);
        assert_eq!(out[1].weighted_percent, 4.5);
    }

    #[test]
    fn shared_holding_accumulates_across_etfs() {
        let rows = vec![
            (60.0, vec![holding("X", 10.0)]),
            (40.0, vec![holding("X", 8.0)]),
        ];
        let out = aggregate_exposures(&rows);
        assert_eq!(out.len(), 1);
        assert!((out[0].weighted_percent - 9.2).abs() < 1e-9);
    }

    #[test]
    fn missing_holdings_degrade_gracefully() {
        let rows = vec![
            (70.0, vec![holding("A", 10.0)]),
            (30.0, vec![]),
        ];
        let out = aggregate_exposures(&rows);
        assert_eq!(out.len(), 1);
        assert!((out[0].weighted_percent - 7.0).abs() < 1e-9);
    }

    #[test]
    fn sorted_descending_with_first_seen_tiebreak() {
        let rows = vec![(
            100.0,
            vec![
                holding("small", 1.0),
                holding("tie_a", 5.0),
                holding("tie_b", 5.0),
                holding("big", 9.0),
            ],
        )];
        let out = aggregate_exposures(&rows);
        let names: Vec<&str> = out.iter().map(|h| h.holding_name.as_str()).collect();
        assert_eq!(names, vec!["big", "tie_a", "tie_b", "small"]);
    }

    #[test]
    fn empty_portfolio_yields_empty_table() {
        assert!(aggregate_exposures(&[]).is_empty());
    }
}
