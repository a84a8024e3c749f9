use proptest::prelude::*;

use tb_sim::{
    AddressConfig, Harness, HarnessArgs, JtagPins, JtagServer, JtagStatus, Model, SimClock,
    StepOutcome, SymbolTable, Termination, Timing, Transport, DEFAULT_MAILBOX,
};

/// Minimal model that only counts evaluations.
#[derive(Default)]
struct CountingModel {
    evals: u64,
    reset_seen_at: Vec<bool>,
    reset: bool,
}

impl Model for CountingModel {
    fn set_clock(&mut self, _level: bool) {}
    fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }
    fn set_jtag_trst_n(&mut self, _level: bool) {}
    fn jtag_pins(&self) -> JtagPins {
        JtagPins::default()
    }
    fn drive_jtag(&mut self, _pins: &JtagPins) {}
    fn set_addresses(&mut self, _addresses: &AddressConfig) {}
    fn eval(&mut self) {
        self.evals += 1;
        self.reset_seen_at.push(self.reset);
    }
    fn finished(&self) -> bool {
        false
    }
}

/// Succeeds a fixed number of times, then reports `last`.
struct FailingServer {
    remaining: usize,
    last: JtagStatus,
}

impl JtagServer for FailingServer {
    fn do_jtag(&mut self, _tick: u64, _pins: &mut JtagPins) -> JtagStatus {
        if self.remaining == 0 {
            self.last
        } else {
            self.remaining -= 1;
            JtagStatus::Success
        }
    }
}

// Property test generators

/// Symbol names as produced by a typical `nm` dump
fn symbol_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

/// Addresses fitting in 32 bits
fn address() -> impl Strategy<Value = u64> {
    0u64..=0xFFFF_FFFF
}

/// Optional middle column of a symbol dump
fn type_column() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just(" T"), Just(" D 00000004"), Just("\t\tt")]
}

fn argv(list: &[String]) -> HarnessArgs {
    let argv = std::iter::once("tb-sim".to_string()).chain(list.iter().cloned());
    HarnessArgs::from_argv(argv).unwrap()
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// Property: a lookup returns the address from the last line naming the symbol
        #[test]
        fn prop_symbol_last_definition_wins(
            entries in prop::collection::vec((symbol_name(), address(), type_column()), 1..40)
        ) {
            let text: String = entries
                .iter()
                .map(|(name, addr, column)| format!("{:08x}{} {}  \n", addr, column, name))
                .collect();
            let table = SymbolTable::parse(&text);

            for (name, _, _) in &entries {
                let expected = entries.iter().rev().find(|(n, _, _)| n == name).map(|(_, a, _)| *a);
                prop_assert_eq!(table.get(name), expected);
            }
        }

        /// Property: an explicit signature range beats whatever the symbol file says
        #[test]
        fn prop_mem_signature_beats_symbols(
            sym_begin in address(),
            sym_end in address(),
            begin in address(),
            end in address(),
            signature_first in any::<bool>(),
        ) {
            let table = SymbolTable::parse(&format!(
                "{:x} begin_signature\n{:x} end_signature\n",
                sym_begin, sym_end
            ));
            let sig = vec![
                "--mem-signature".to_string(),
                format!("{:x}", begin),
                format!("{:x}", end),
            ];
            let sym = vec!["--symbols".to_string(), "syms.txt".to_string()];
            let list: Vec<String> = if signature_first {
                sig.into_iter().chain(sym).collect()
            } else {
                sym.into_iter().chain(sig).collect()
            };

            let config = AddressConfig::resolve_with(&argv(&list), &[table]);
            prop_assert_eq!(config.signature_begin, begin);
            prop_assert_eq!(config.signature_end, end);
            prop_assert_eq!(config.mailbox, DEFAULT_MAILBOX);
        }

        /// Property: an unresolved mailbox symbol leaves the previous value alone
        #[test]
        fn prop_missing_mailbox_symbol_is_noop(
            mailbox in prop::option::of(address()),
            missing in symbol_name(),
        ) {
            let table = SymbolTable::parse("80001000 tohost\n");
            prop_assume!(missing != "tohost");

            let mut list = vec!["--mailbox-sym".to_string(), missing];
            if let Some(addr) = mailbox {
                list.push("--mailbox-addr".to_string());
                list.push(format!("{:X}", addr));
            }

            let config = AddressConfig::resolve_with(&argv(&list), &[table]);
            prop_assert_eq!(config.mailbox, mailbox.unwrap_or(DEFAULT_MAILBOX));
        }

        /// Property: time grows by one step per iteration and the clock is (time / step) mod 2
        #[test]
        fn prop_clock_tracks_time(step in 1u64..1000, iterations in 1usize..500) {
            let mut clock = SimClock::new(step).unwrap();
            let mut previous = clock.time();
            for _ in 0..iterations {
                let level = clock.tick();
                prop_assert_eq!(clock.time(), previous + step);
                prop_assert_eq!(level, (clock.time() / step) % 2 == 1);
                previous = clock.time();
            }
        }

        /// Property: reset stays asserted until the release threshold and never longer
        #[test]
        fn prop_reset_released_exactly_at_threshold(
            step in 1u64..50,
            release_steps in 1u64..40,
        ) {
            let timing = Timing {
                step,
                reset_release: step * release_steps,
                ..Timing::default()
            };
            let mut harness = Harness::new(CountingModel::default(), timing)
                .unwrap()
                .with_max_time(Some(step * (release_steps + 5)));
            harness.run();

            prop_assert_eq!(harness.model().evals, release_steps + 5);

            let seen = &harness.model().reset_seen_at;
            for (i, &reset) in seen.iter().enumerate() {
                let time = i as u64 * step;
                prop_assert_eq!(reset, time < timing.reset_release);
            }
        }

        /// Property: any non-success transport status ends the run and stops exchanges
        #[test]
        fn prop_transport_failure_terminates(
            successes in 0usize..50,
            disconnect in any::<bool>(),
        ) {
            let last = if disconnect {
                JtagStatus::ClientDisconnected
            } else {
                JtagStatus::Error
            };
            let server = FailingServer { remaining: successes, last };
            let mut harness = Harness::new(CountingModel::default(), Timing::default())
                .unwrap()
                .with_transport(Transport::active(server));

            let report = harness.run();
            let expected = if disconnect {
                Termination::TransportDisconnected
            } else {
                Termination::TransportError
            };
            prop_assert_eq!(report.termination, expected);
            prop_assert_eq!(report.exchanges, successes as u64 + 1);

            // Activation is strictly after t = 300, the first exchange is at 310.
            prop_assert_eq!(report.final_time, 320 + 10 * successes as u64);

            let outcome = harness.step();
            prop_assert_ne!(outcome, StepOutcome::Continue);
            prop_assert_eq!(harness.exchanges(), successes as u64 + 1);
        }
    }
}
