//! Fee selection for first attempts and replacements.

use hoist_core::Wei;
use hoist_journal::NetworkFees;

use super::rpc::FeeData;

/// Fees for a first attempt: EIP-1559 when the node reports a base fee
/// (`maxFee = 2 * base + tip`), a legacy gas price otherwise.
pub fn initial_fees(network: &FeeData, cap: Option<Wei>) -> NetworkFees {
    let fees = match network.base_fee_per_gas {
        Some(base) => NetworkFees::Eip1559 {
            max_fee_per_gas: base
                .saturating_mul(2)
                .saturating_add(network.max_priority_fee_per_gas),
            max_priority_fee_per_gas: network.max_priority_fee_per_gas,
        },
        None => NetworkFees::Legacy {
            gas_price: network.gas_price,
        },
    };
    clamp(fees, cap)
}

/// Fees for a same-nonce replacement: every component grows by at least
/// `bump_percent` and never falls below what the network currently asks.
pub fn bumped_fees(
    previous: &NetworkFees,
    network: &FeeData,
    bump_percent: u32,
    cap: Option<Wei>,
) -> NetworkFees {
    let current = initial_fees(network, None);
    let raise = |prev: Wei, suggested: Wei| {
        let scaled = prev.scale_percent(100 + bump_percent);
        let strictly_higher = prev.saturating_add(Wei::new(1));
        scaled.max(strictly_higher).max(suggested)
    };
    let fees = match (previous, current) {
        (
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            NetworkFees::Eip1559 {
                max_fee_per_gas: suggested_max,
                max_priority_fee_per_gas: suggested_tip,
            },
        ) => NetworkFees::Eip1559 {
            max_fee_per_gas: raise(*max_fee_per_gas, suggested_max),
            max_priority_fee_per_gas: raise(*max_priority_fee_per_gas, suggested_tip),
        },
        (
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            NetworkFees::Legacy { gas_price },
        ) => NetworkFees::Eip1559 {
            max_fee_per_gas: raise(*max_fee_per_gas, gas_price),
            max_priority_fee_per_gas: raise(*max_priority_fee_per_gas, Wei::ZERO),
        },
        (NetworkFees::Legacy { gas_price }, suggested) => NetworkFees::Legacy {
            gas_price: raise(*gas_price, suggested.max_price()),
        },
    };
    clamp(fees, cap)
}

/// Fees for resubmitting a dropped transaction: whatever is higher of the
/// previous attempt and the current network suggestion.
pub fn resubmission_fees(previous: &NetworkFees, network: &FeeData, cap: Option<Wei>) -> NetworkFees {
    let current = initial_fees(network, None);
    let fees = match (previous, current) {
        (
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            NetworkFees::Eip1559 {
                max_fee_per_gas: suggested_max,
                max_priority_fee_per_gas: suggested_tip,
            },
        ) => NetworkFees::Eip1559 {
            max_fee_per_gas: (*max_fee_per_gas).max(suggested_max),
            max_priority_fee_per_gas: (*max_priority_fee_per_gas).max(suggested_tip),
        },
        (previous, current) => {
            if current.max_price() > previous.max_price() {
                current
            } else {
                *previous
            }
        }
    };
    clamp(fees, cap)
}

fn clamp(fees: NetworkFees, cap: Option<Wei>) -> NetworkFees {
    let Some(cap) = cap else {
        return fees;
    };
    match fees {
        NetworkFees::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let max_fee_per_gas = max_fee_per_gas.min(cap);
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas: max_priority_fee_per_gas.min(max_fee_per_gas),
            }
        }
        NetworkFees::Legacy { gas_price } => NetworkFees::Legacy {
            gas_price: gas_price.min(cap),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;

    fn london(base: u128, tip: u128) -> FeeData {
        FeeData {
            base_fee_per_gas: Some(Wei::new(base * GWEI)),
            max_priority_fee_per_gas: Wei::new(tip * GWEI),
            gas_price: Wei::new((base + tip) * GWEI),
        }
    }

    #[test]
    fn eip1559_max_fee_is_twice_base_plus_tip() {
        let fees = initial_fees(&london(10, 2), None);
        assert_eq!(
            fees,
            NetworkFees::Eip1559 {
                max_fee_per_gas: Wei::new(22 * GWEI),
                max_priority_fee_per_gas: Wei::new(2 * GWEI),
            }
        );
    }

    #[test]
    fn legacy_without_base_fee() {
        let network = FeeData {
            base_fee_per_gas: None,
            max_priority_fee_per_gas: Wei::ZERO,
            gas_price: Wei::new(7 * GWEI),
        };
        assert_eq!(
            initial_fees(&network, None),
            NetworkFees::Legacy {
                gas_price: Wei::new(7 * GWEI)
            }
        );
    }

    #[test]
    fn bump_raises_by_percent_when_network_is_calm() {
        let previous = initial_fees(&london(10, 2), None);
        let bumped = bumped_fees(&previous, &london(10, 2), 10, None);
        assert_eq!(
            bumped,
            NetworkFees::Eip1559 {
                max_fee_per_gas: Wei::new(24_200_000_000),
                max_priority_fee_per_gas: Wei::new(2_200_000_000),
            }
        );
    }

    #[test]
    fn bump_follows_a_spiking_network() {
        let previous = initial_fees(&london(10, 2), None);
        let bumped = bumped_fees(&previous, &london(50, 3), 10, None);
        assert_eq!(bumped.max_price(), Wei::new(103 * GWEI));
    }

    #[test]
    fn bump_is_strictly_higher_even_for_tiny_fees() {
        let previous = NetworkFees::Legacy { gas_price: Wei::new(1) };
        let network = FeeData {
            base_fee_per_gas: None,
            max_priority_fee_per_gas: Wei::ZERO,
            gas_price: Wei::new(1),
        };
        assert_eq!(bumped_fees(&previous, &network, 10, None).max_price(), Wei::new(2));
    }

    #[test]
    fn cap_clamps_fee_and_tip() {
        let previous = initial_fees(&london(10, 2), None);
        let bumped = bumped_fees(&previous, &london(10, 2), 10, Some(Wei::new(GWEI)));
        assert_eq!(
            bumped,
            NetworkFees::Eip1559 {
                max_fee_per_gas: Wei::new(GWEI),
                max_priority_fee_per_gas: Wei::new(GWEI),
            }
        );
    }

    #[test]
    fn resubmission_keeps_the_higher_fees() {
        let previous = initial_fees(&london(10, 2), None);
        assert_eq!(resubmission_fees(&previous, &london(1, 1), None), previous);
    }
}
