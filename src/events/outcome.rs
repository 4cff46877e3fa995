//! # Delivery result bitmask.
//!
//! [`Outcome`] is the bitmask a consumer returns from
//! [`Consume::process`](crate::Consume::process). Bits compose with `|`:
//! a consumer that finished a request/response exchange but wants to keep the
//! carrier occupied returns `CONSUMED | DONE | KEEP`.
//!
//! ## Bits
//! | Bit | Meaning |
//! |-----|---------|
//! | [`CONSUMED`](Outcome::CONSUMED) | this destination acted on the event |
//! | [`KEEP`](Outcome::KEEP) | suppress the automatic release (the consumer re-queued the carrier itself) |
//! | [`DONE`](Outcome::DONE) | a possibly multi-event task reached logical completion |
//! | [`FAULT`](Outcome::FAULT) | the consumer failed or panicked; set by the delivery wrapper, never by consumer code |

use bitflags::bitflags;

bitflags! {
    /// Result bits of a single event delivery.
    ///
    /// `KEEP` defers the automatic release that normally follows delivery;
    /// the party that re-queued or inspected the carrier must call
    /// [`Event::release`](crate::Event::release) itself. `FAULT` is reserved
    /// for the delivery wrapper: well-behaved consumers never set it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Outcome: u8 {
        /// This destination acted on the event (informational).
        const CONSUMED = 0b0001;
        /// Do not release the carrier; it was re-queued elsewhere.
        const KEEP     = 0b0010;
        /// Logical completion of the surrounding (possibly multi-event) task.
        const DONE     = 0b0100;
        /// The consumer raised an error or panicked during processing.
        const FAULT    = 0b1000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_compose() {
        let bits = Outcome::CONSUMED | Outcome::DONE | Outcome::KEEP;
        assert!(bits.contains(Outcome::CONSUMED));
        assert!(bits.contains(Outcome::DONE));
        assert!(bits.contains(Outcome::KEEP));
        assert!(!bits.contains(Outcome::FAULT));
    }

    #[test]
    fn test_empty_outcome_has_no_bits() {
        let bits = Outcome::empty();
        assert!(!bits.contains(Outcome::CONSUMED));
        assert_eq!(bits, Outcome::default());
    }

    #[test]
    fn test_fault_is_disjoint() {
        let bits = Outcome::FAULT;
        assert!(!bits.intersects(Outcome::CONSUMED | Outcome::KEEP | Outcome::DONE));
    }
}
