//! Broadcast-delay and attestation-modify endpoints driven by the `block` and `attest` sections of
//! the installed strategy rather than by slot rules.

use crate::backend::BeaconBackend;
use crate::dispatcher::{decode_payload, encode_payload, HookResponse};
use crate::hook::HookName;
use crate::strategy::{BroadcastStrategy, Payload};
use crate::AttackerService;
use slog::{debug, info};
use slot_clock::SlotClock;
use std::time::Duration;
use types::{Pubkey, Slot};

impl<T: SlotClock + 'static, B: BeaconBackend> AttackerService<T, B> {
    /// Holds a block broadcast for the configured number of milliseconds.
    pub fn block_broadcast_delay(&self) -> HookResponse {
        let settings = self.strategy().strategy.block.clone();
        self.broadcast_delay("block", &settings)
    }

    /// Holds an attestation broadcast for the configured number of milliseconds.
    pub fn attest_broadcast_delay(&self) -> HookResponse {
        let settings = self.strategy().strategy.attest.clone();
        self.broadcast_delay("attestation", &settings)
    }

    fn broadcast_delay(&self, kind: &'static str, settings: &BroadcastStrategy) -> HookResponse {
        if settings.delay_enable {
            info!(
                self.log,
                "Delaying broadcast";
                "kind" => kind,
                "millis" => settings.broad_cast_delay,
            );
            std::thread::sleep(Duration::from_millis(settings.broad_cast_delay));
        }
        HookResponse::null(String::new())
    }

    /// Moves an unsigned attestation one slot forward when `attest.modify_enable` is set and the
    /// execution chain height is odd.
    ///
    /// Any decode or backend failure leaves the payload as it was.
    pub fn modify_attestation(
        &self,
        slot: Slot,
        pubkey: &Pubkey,
        payload: Option<&str>,
    ) -> HookResponse {
        let original = payload.unwrap_or_default().to_string();
        if !self.strategy().strategy.attest.modify_enable {
            return HookResponse::null(original);
        }

        let mut data = match decode_payload(HookName::AttestBeforeSign, payload) {
            Ok(Some(Payload::AttestationData(data))) => data,
            Ok(_) => return HookResponse::null(original),
            Err(e) => {
                debug!(self.log, "Unable to decode attestation data"; "error" => ?e);
                return HookResponse::null(original);
            }
        };

        match self.backend.execution_block_number() {
            Ok(height) if height % 2 == 1 => {
                data.slot += 1;
                info!(
                    self.log,
                    "Modified attestation slot";
                    "slot" => %slot,
                    "pubkey" => %pubkey,
                    "new_slot" => %data.slot,
                    "execution_height" => height,
                );
                HookResponse::null(encode_payload(&Payload::AttestationData(data)))
            }
            Ok(height) => {
                debug!(self.log, "Attestation left unmodified"; "execution_height" => height);
                HookResponse::null(original)
            }
            Err(e) => {
                debug!(self.log, "Unable to read execution height"; "error" => ?e);
                HookResponse::null(original)
            }
        }
    }
}
