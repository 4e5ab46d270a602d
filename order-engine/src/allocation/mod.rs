//! Splits block-order fills across sub-accounts.
//!
//! Allocations are driven by the order's cumulative filled quantity: after
//! every fill the engine computes each account's target share of what has
//! been filled so far and tops accounts up towards it. Allocations never
//! shrink and their sum never exceeds the filled quantity.

use chrono::{DateTime, Utc};
use log::debug;
use oms::{AllocationMethod, AllocationRequest, OrderAllocation, OrderId};
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("allocation list is empty")]
    Empty,
    #[error("allocation quantity for {account} must be positive, got {quantity}")]
    NonPositiveQuantity { account: String, quantity: Decimal },
    #[error("account {0} appears more than once")]
    DuplicateAccount(String),
    #[error("allocations total {requested} exceeds order quantity {order_quantity}")]
    ExceedsOrder {
        requested: Decimal,
        order_quantity: Decimal,
    },
    #[error("priority allocation for {0} needs a priority of at least 1")]
    MissingPriority(String),
}

/// Checks a set of allocation requests against the order they split.
pub fn validate_requests(
    order_quantity: Decimal,
    method: AllocationMethod,
    requests: &[AllocationRequest],
) -> Result<(), AllocationError> {
    if requests.is_empty() {
        return Err(AllocationError::Empty);
    }
    let mut seen = HashSet::new();
    for request in requests {
        if request.quantity <= Decimal::ZERO {
            return Err(AllocationError::NonPositiveQuantity {
                account: request.account_id.to_string(),
                quantity: request.quantity,
            });
        }
        if !seen.insert(&request.account_id) {
            return Err(AllocationError::DuplicateAccount(request.account_id.to_string()));
        }
        if method == AllocationMethod::Priority && request.priority == 0 {
            return Err(AllocationError::MissingPriority(request.account_id.to_string()));
        }
    }
    let requested: Decimal = requests.iter().map(|r| r.quantity).sum();
    if requested > order_quantity {
        return Err(AllocationError::ExceedsOrder {
            requested,
            order_quantity,
        });
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationEngine;

impl AllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Creates the pending allocations of a new block order.
    pub fn allocate(
        &self,
        order_id: OrderId,
        order_quantity: Decimal,
        method: AllocationMethod,
        requests: &[AllocationRequest],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderAllocation>, AllocationError> {
        validate_requests(order_quantity, method, requests)?;
        Ok(requests
            .iter()
            .enumerate()
            .map(|(sequence, request)| OrderAllocation::new(order_id, request, method, sequence, now))
            .collect())
    }

    /// Distributes a fill.
    ///
    /// # Arguments
    ///
    /// * `allocations` - The order's allocations, updated in place.
    /// * `method` - Distribution rule.
    /// * `cumulative_filled` - Order filled quantity including this fill.
    /// * `price` - Fill price, used for the allocated value.
    ///
    /// # Returns
    ///
    /// * `Decimal` - Quantity newly allocated by this fill.
    pub fn distribute(
        &self,
        allocations: &mut [OrderAllocation],
        method: AllocationMethod,
        cumulative_filled: Decimal,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Decimal {
        if allocations.is_empty() {
            return Decimal::ZERO;
        }
        let total_requested: Decimal = allocations.iter().map(|a| a.requested_quantity()).sum();
        let already: Decimal = allocations.iter().map(|a| a.allocated_quantity()).sum();
        let cap = cumulative_filled.min(total_requested);
        let mut available = cap - already;
        if available <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let requested: Vec<Decimal> = allocations.iter().map(|a| a.requested_quantity()).collect();
        let (targets, order) = match method {
            AllocationMethod::Priority => {
                let mut order: Vec<usize> = (0..allocations.len()).collect();
                order.sort_by_key(|&i| (allocations[i].priority(), allocations[i].sequence()));
                (sequential_targets(cap, &requested, &order), order)
            }
            AllocationMethod::Manual => {
                let order: Vec<usize> = (0..allocations.len()).collect();
                (sequential_targets(cap, &requested, &order), order)
            }
            AllocationMethod::Proportional | AllocationMethod::Fifo | AllocationMethod::ProRata => {
                proportional_targets(cap, total_requested, &requested, method, allocations)
            }
        };

        let mut distributed = Decimal::ZERO;
        for &i in &order {
            if available <= Decimal::ZERO {
                break;
            }
            let allocation = &mut allocations[i];
            let delta = (targets[i] - allocation.allocated_quantity())
                .max(Decimal::ZERO)
                .min(available)
                .min(allocation.outstanding_quantity());
            if delta > Decimal::ZERO {
                allocation.allocate(delta, price, now);
                available -= delta;
                distributed += delta;
            }
        }
        debug!(
            "Distributed {} of cumulative fill {} across {} allocations ({:?})",
            distributed,
            cumulative_filled,
            allocations.len(),
            method
        );
        distributed
    }

    /// Settles allocation statuses once the order can take no more fills.
    pub fn finalize(&self, allocations: &mut [OrderAllocation], now: DateTime<Utc>) {
        for allocation in allocations.iter_mut() {
            allocation.finalize(now);
        }
    }
}

/// Fills accounts one after another in `order` up to their requested quantity.
fn sequential_targets(cap: Decimal, requested: &[Decimal], order: &[usize]) -> Vec<Decimal> {
    let mut targets = vec![Decimal::ZERO; requested.len()];
    let mut left = cap;
    for &i in order {
        let take = requested[i].min(left);
        targets[i] = take;
        left -= take;
    }
    targets
}

/// Pro-rata shares of `cap`, rounded toward zero at the requests' quantity
/// scale. The rounding residue goes out one unit at a time following the
/// method's tie-break; the same order is returned for the top-up pass.
fn proportional_targets(
    cap: Decimal,
    total_requested: Decimal,
    requested: &[Decimal],
    method: AllocationMethod,
    allocations: &[OrderAllocation],
) -> (Vec<Decimal>, Vec<usize>) {
    let scale = requested.iter().map(|q| q.scale()).max().unwrap_or(0);
    let unit = Decimal::new(1, scale);

    let exact: Vec<Decimal> = requested
        .iter()
        .map(|q| cap * *q / total_requested)
        .collect();
    let mut targets: Vec<Decimal> = exact
        .iter()
        .map(|e| e.round_dp_with_strategy(scale, RoundingStrategy::ToZero))
        .collect();

    let mut order: Vec<usize> = (0..requested.len()).collect();
    let remainder = |i: usize| exact[i] - targets[i];
    match method {
        AllocationMethod::Fifo => order.sort_by_key(|&i| allocations[i].sequence()),
        AllocationMethod::ProRata => order.sort_by(|&a, &b| {
            requested[b]
                .cmp(&requested[a])
                .then(allocations[a].sequence().cmp(&allocations[b].sequence()))
        }),
        _ => order.sort_by(|&a, &b| match remainder(b).cmp(&remainder(a)) {
            Ordering::Equal => allocations[a].sequence().cmp(&allocations[b].sequence()),
            other => other,
        }),
    }

    let mut residue = cap - targets.iter().copied().sum::<Decimal>();
    'spread: while residue >= unit {
        let before = residue;
        for &i in &order {
            if residue < unit {
                break 'spread;
            }
            if targets[i] + unit <= requested[i] {
                targets[i] += unit;
                residue -= unit;
            }
        }
        if residue == before {
            break;
        }
    }
    (targets, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms::AllocationStatus;
    use rust_decimal_macros::dec;

    fn allocations(
        method: AllocationMethod,
        requests: &[AllocationRequest],
        order_quantity: Decimal,
    ) -> Vec<OrderAllocation> {
        AllocationEngine::new()
            .allocate(OrderId::new(), order_quantity, method, requests, Utc::now())
            .unwrap()
    }

    fn allocated(allocs: &[OrderAllocation]) -> Vec<Decimal> {
        allocs.iter().map(|a| a.allocated_quantity()).collect()
    }

    #[test]
    fn proportional_sixty_forty() {
        let requests = [
            AllocationRequest::new("A", dec!(60)),
            AllocationRequest::new("B", dec!(40)),
        ];
        let engine = AllocationEngine::new();

        let mut full = allocations(AllocationMethod::Proportional, &requests, dec!(100));
        engine.distribute(&mut full, AllocationMethod::Proportional, dec!(100), dec!(10), Utc::now());
        assert_eq!(allocated(&full), vec![dec!(60), dec!(40)]);
        assert!(full.iter().all(|a| a.status() == AllocationStatus::Allocated));

        let mut half = allocations(AllocationMethod::Proportional, &requests, dec!(100));
        engine.distribute(&mut half, AllocationMethod::Proportional, dec!(50), dec!(10), Utc::now());
        assert_eq!(allocated(&half), vec![dec!(30), dec!(20)]);
    }

    #[test]
    fn residue_goes_to_largest_remainder() {
        let requests = [
            AllocationRequest::new("A", dec!(1)),
            AllocationRequest::new("B", dec!(1)),
            AllocationRequest::new("C", dec!(1)),
        ];
        let engine = AllocationEngine::new();
        let mut allocs = allocations(AllocationMethod::Proportional, &requests, dec!(3));

        engine.distribute(&mut allocs, AllocationMethod::Proportional, dec!(1), dec!(5), Utc::now());
        assert_eq!(allocated(&allocs), vec![dec!(1), dec!(0), dec!(0)]);

        engine.distribute(&mut allocs, AllocationMethod::Proportional, dec!(2), dec!(5), Utc::now());
        assert_eq!(allocated(&allocs), vec![dec!(1), dec!(1), dec!(0)]);
    }

    #[test]
    fn pro_rata_residue_goes_to_largest_request() {
        let requests = [
            AllocationRequest::new("A", dec!(3)),
            AllocationRequest::new("B", dec!(7)),
        ];
        let mut allocs = allocations(AllocationMethod::ProRata, &requests, dec!(10));
        // 5 * 0.3 = 1.5 -> 1, 5 * 0.7 = 3.5 -> 3, residue 1 to B
        AllocationEngine::new().distribute(
            &mut allocs,
            AllocationMethod::ProRata,
            dec!(5),
            dec!(1),
            Utc::now(),
        );
        assert_eq!(allocated(&allocs), vec![dec!(1), dec!(4)]);
    }

    #[test]
    fn fifo_residue_goes_to_earliest_request() {
        let requests = [
            AllocationRequest::new("A", dec!(3)),
            AllocationRequest::new("B", dec!(7)),
        ];
        let mut allocs = allocations(AllocationMethod::Fifo, &requests, dec!(10));
        AllocationEngine::new().distribute(
            &mut allocs,
            AllocationMethod::Fifo,
            dec!(5),
            dec!(1),
            Utc::now(),
        );
        assert_eq!(allocated(&allocs), vec![dec!(2), dec!(3)]);
    }

    #[test]
    fn priority_fills_highest_first() {
        let requests = [
            AllocationRequest::new("LOW", dec!(50)).with_priority(2),
            AllocationRequest::new("HIGH", dec!(50)).with_priority(1),
        ];
        let engine = AllocationEngine::new();
        let mut allocs = allocations(AllocationMethod::Priority, &requests, dec!(100));

        engine.distribute(&mut allocs, AllocationMethod::Priority, dec!(70), dec!(10), Utc::now());
        assert_eq!(allocated(&allocs), vec![dec!(20), dec!(50)]);

        engine.finalize(&mut allocs, Utc::now());
        assert_eq!(allocs[0].status(), AllocationStatus::Partial);
        assert_eq!(allocs[1].status(), AllocationStatus::Allocated);
    }

    #[test]
    fn manual_fills_in_request_order_and_tracks_value() {
        let requests = [
            AllocationRequest::new("A", dec!(10)),
            AllocationRequest::new("B", dec!(10)),
        ];
        let engine = AllocationEngine::new();
        let mut allocs = allocations(AllocationMethod::Manual, &requests, dec!(20));

        engine.distribute(&mut allocs, AllocationMethod::Manual, dec!(5), dec!(10), Utc::now());
        engine.distribute(&mut allocs, AllocationMethod::Manual, dec!(15), dec!(20), Utc::now());
        assert_eq!(allocated(&allocs), vec![dec!(10), dec!(5)]);
        assert_eq!(allocs[0].allocated_value(), dec!(150));
        assert_eq!(allocs[1].allocated_value(), dec!(100));
    }

    #[test]
    fn never_allocates_more_than_filled() {
        let requests = [
            AllocationRequest::new("A", dec!(33)),
            AllocationRequest::new("B", dec!(33)),
            AllocationRequest::new("C", dec!(34)),
        ];
        let engine = AllocationEngine::new();
        let mut allocs = allocations(AllocationMethod::Proportional, &requests, dec!(100));
        let mut filled = Decimal::ZERO;
        for fill in [dec!(7), dec!(13), dec!(1), dec!(29), dec!(50)] {
            filled += fill;
            engine.distribute(&mut allocs, AllocationMethod::Proportional, filled, dec!(1), Utc::now());
            let total: Decimal = allocated(&allocs).into_iter().sum();
            assert!(total <= filled);
        }
        assert_eq!(allocated(&allocs), vec![dec!(33), dec!(33), dec!(34)]);
    }

    #[test]
    fn requests_are_validated() {
        let ok = AllocationRequest::new("A", dec!(10));
        assert_eq!(
            validate_requests(dec!(10), AllocationMethod::Proportional, &[]),
            Err(AllocationError::Empty)
        );
        assert!(matches!(
            validate_requests(dec!(10), AllocationMethod::Proportional, &[ok.clone(), ok.clone()]),
            Err(AllocationError::DuplicateAccount(_))
        ));
        assert!(matches!(
            validate_requests(dec!(5), AllocationMethod::Proportional, &[ok.clone()]),
            Err(AllocationError::ExceedsOrder { .. })
        ));
        assert!(matches!(
            validate_requests(dec!(10), AllocationMethod::Priority, &[ok]),
            Err(AllocationError::MissingPriority(_))
        ));
    }
}
