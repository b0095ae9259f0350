//! Answers hook calls: selects the rule for the slot, runs the action bound to the hook and
//! re-encodes whatever payload the action hands back.
//!
//! Payloads travel as base64 (standard alphabet) encoded SSZ. A payload that cannot be decoded,
//! a slot without a rule and a rule without an action for the hook all produce `NULL` with the
//! caller's payload returned byte for byte.

use crate::backend::BeaconBackend;
use crate::hook::{HookName, PayloadKind};
use crate::metrics;
use crate::strategy::{Command, Payload};
use crate::AttackerService;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use slog::{debug, warn};
use slot_clock::SlotClock;
use ssz::{Decode, Encode};
use types::{Attestation, AttestationData, BeaconBlock, Pubkey, SignedBeaconBlock, Slot};

#[derive(Debug)]
pub enum Error {
    Base64(base64::DecodeError),
    Ssz(ssz::DecodeError),
    /// A payload was sent to a hook which does not carry one.
    UnexpectedPayload(HookName),
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Base64(e)
    }
}

impl From<ssz::DecodeError> for Error {
    fn from(e: ssz::DecodeError) -> Self {
        Error::Ssz(e)
    }
}

/// The body of `POST /v1/hook/{hook_name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRequest {
    pub slot: Slot,
    pub pubkey: Pubkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResponse {
    pub cmd: Command,
    pub result: String,
}

impl HookResponse {
    pub fn null(result: String) -> Self {
        Self {
            cmd: Command::Null,
            result,
        }
    }
}

/// Decodes the payload of a call to `hook`. An absent or empty payload decodes to `None`.
pub fn decode_payload(hook: HookName, encoded: Option<&str>) -> Result<Option<Payload>, Error> {
    let encoded = match encoded.map(str::trim) {
        Some(encoded) if !encoded.is_empty() => encoded,
        _ => return Ok(None),
    };

    let kind = hook.payload_kind();
    if kind == PayloadKind::None {
        return Err(Error::UnexpectedPayload(hook));
    }

    let bytes = STANDARD.decode(encoded)?;
    let payload = match kind {
        PayloadKind::BeaconBlock => {
            Payload::BeaconBlock(Box::new(BeaconBlock::from_ssz_bytes(&bytes)?))
        }
        PayloadKind::SignedBeaconBlock => {
            Payload::SignedBeaconBlock(Box::new(SignedBeaconBlock::from_ssz_bytes(&bytes)?))
        }
        PayloadKind::AttestationData => {
            Payload::AttestationData(AttestationData::from_ssz_bytes(&bytes)?)
        }
        PayloadKind::Attestation => Payload::Attestation(Attestation::from_ssz_bytes(&bytes)?),
        PayloadKind::None => return Err(Error::UnexpectedPayload(hook)),
    };

    Ok(Some(payload))
}

/// Encodes a payload for the `result` field of a hook response.
///
/// Roots are rendered as `0x`-prefixed hex, everything else as base64 SSZ.
pub fn encode_payload(payload: &Payload) -> String {
    match payload {
        Payload::BeaconBlock(block) => STANDARD.encode(block.as_ssz_bytes()),
        Payload::SignedBeaconBlock(block) => STANDARD.encode(block.as_ssz_bytes()),
        Payload::AttestationData(data) => STANDARD.encode(data.as_ssz_bytes()),
        Payload::Attestation(attestation) => STANDARD.encode(attestation.as_ssz_bytes()),
        Payload::Root(root) => format!("{:?}", root),
    }
}

impl<T: SlotClock + 'static, B: BeaconBackend> AttackerService<T, B> {
    /// Handles one hook call. Never fails: every problem degrades to `NULL` with the caller's
    /// payload unchanged.
    ///
    /// Delay actions block the calling thread until they elapse.
    pub fn dispatch(
        &self,
        hook: HookName,
        slot: Slot,
        pubkey: &Pubkey,
        payload: Option<&str>,
    ) -> HookResponse {
        let _timer = metrics::start_timer_vec(&metrics::HOOK_DISPATCH_TIMES, &[hook.as_str()]);
        metrics::inc_counter_vec(&metrics::HOOK_CALLS, &[hook.as_str()]);

        let original = payload.unwrap_or_default();
        let rule_set = self.strategy();
        let ctx = self.context(&rule_set);

        let Some(action) = rule_set
            .select(slot, &ctx)
            .and_then(|rule| rule.actions.get(&hook))
        else {
            return HookResponse::null(original.to_string());
        };

        let decoded = match decode_payload(hook, payload) {
            Ok(decoded) => decoded,
            // The hook carries nothing to mutate, so the stray payload is ignored and the
            // action's command still applies.
            Err(e @ Error::UnexpectedPayload(_)) => {
                warn!(
                    self.log,
                    "Ignoring payload sent to a hook without one";
                    "hook" => hook.as_str(),
                    "slot" => %slot,
                    "error" => ?e,
                );
                None
            }
            Err(e) => {
                metrics::inc_counter_vec(&metrics::PAYLOAD_DECODE_FAILURES, &[hook.as_str()]);
                warn!(
                    self.log,
                    "Unable to decode hook payload";
                    "hook" => hook.as_str(),
                    "slot" => %slot,
                    "error" => ?e,
                );
                return HookResponse::null(original.to_string());
            }
        };

        debug!(
            self.log,
            "Dispatching hook";
            "hook" => hook.as_str(),
            "slot" => %slot,
            "pubkey" => %pubkey,
            "action" => %action,
        );

        let result = action.execute(&ctx, slot, pubkey, decoded);
        metrics::inc_counter_vec(&metrics::ACTIONS_EXECUTED, &[action.name()]);

        HookResponse {
            cmd: result.command,
            result: result
                .payload
                .as_ref()
                .map(encode_payload)
                .unwrap_or_else(|| original.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use crate::test_utils::TestContext;
    use types::test_utils::{attestation_data, signed_attestation};
    use types::Hash256;

    fn service(strategy: &str) -> crate::test_utils::TestService {
        let tester = TestContext::new();
        let service = tester.into_service();
        service
            .install_strategy(Strategy::from_json(strategy).unwrap())
            .unwrap();
        service
    }

    fn encoded_data(slot: u64) -> String {
        STANDARD.encode(attestation_data(slot, 0, Hash256::repeat_byte(4)).as_ssz_bytes())
    }

    #[test]
    fn decode_by_hook_kind() {
        let encoded = encoded_data(10);

        match decode_payload(HookName::AttestBeforeSign, Some(&encoded)).unwrap() {
            Some(Payload::AttestationData(data)) => assert_eq!(data.slot, Slot::new(10)),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(matches!(
            decode_payload(HookName::AttestAfterSign, Some(&encoded)),
            Err(Error::Ssz(_))
        ));
        assert!(matches!(
            decode_payload(HookName::AttestBeforeSign, Some("not base64!")),
            Err(Error::Base64(_))
        ));
        assert!(matches!(
            decode_payload(HookName::BlockDelayForBroadCast, Some(&encoded)),
            Err(Error::UnexpectedPayload(HookName::BlockDelayForBroadCast))
        ));
        assert_eq!(decode_payload(HookName::BlockBeforeSign, None).unwrap(), None);
        assert_eq!(decode_payload(HookName::BlockBeforeSign, Some("")).unwrap(), None);
    }

    #[test]
    fn roots_encode_as_hex() {
        let root = Hash256::repeat_byte(0xab);
        assert_eq!(
            encode_payload(&Payload::Root(root)),
            format!("0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn unmatched_slot_is_null() {
        let service = service(
            r#"{"slots": [{"slot": "64", "actions": {"BlockBeforeSign": "return"}}]}"#,
        );
        let pubkey = Pubkey::from([1; 48]);

        let response =
            service.dispatch(HookName::BlockBeforeSign, Slot::new(65), &pubkey, Some("abc"));
        assert_eq!(response, HookResponse::null("abc".into()));

        let response = service.dispatch(HookName::AttestBeforeSign, Slot::new(64), &pubkey, None);
        assert_eq!(response, HookResponse::null(String::new()));
    }

    #[test]
    fn control_action_returns_payload_unchanged() {
        let service = service(
            r#"{"slots": [{"slot": "64", "actions": {"AttestAfterSign": "abort"}}]}"#,
        );
        let attestation = signed_attestation(attestation_data(64, 0, Hash256::zero()), 8, 3);
        let encoded = STANDARD.encode(attestation.as_ssz_bytes());

        let response = service.dispatch(
            HookName::AttestAfterSign,
            Slot::new(64),
            &Pubkey::from([1; 48]),
            Some(&encoded),
        );

        assert_eq!(response.cmd, Command::Abort);
        assert_eq!(response.result, encoded);
    }

    #[test]
    fn undecodable_payload_is_null_and_unchanged() {
        let service = service(
            r#"{"slots": [{"slot": "3", "actions": {"BlockBeforeSign": "exit"}}]}"#,
        );

        let response = service.dispatch(
            HookName::BlockBeforeSign,
            Slot::new(3),
            &Pubkey::from([1; 48]),
            Some("AAAA"),
        );

        assert_eq!(response, HookResponse::null("AAAA".into()));
    }

    #[test]
    fn stray_payload_still_runs_the_command() {
        let service = service(
            r#"{"slots": [{"slot": "8", "actions": {"BlockDelayForBroadCast": "return"}}]}"#,
        );

        let response = service.dispatch(
            HookName::BlockDelayForBroadCast,
            Slot::new(8),
            &Pubkey::from([1; 48]),
            Some(&encoded_data(8)),
        );

        assert_eq!(response.cmd, Command::Return);
        assert_eq!(response.result, encoded_data(8));
    }

    #[test]
    fn modified_parent_root_is_hex() {
        let tester = TestContext::new();
        tester
            .backend
            .set_block_root(Slot::new(9), Hash256::repeat_byte(9));
        let service = tester.into_service();
        service
            .install_strategy(
                Strategy::from_json(
                    r#"{"slots": [{"slot": "10", "actions": {"BlockBeforeSign": "modifyParentRoot:9"}}]}"#,
                )
                .unwrap(),
            )
            .unwrap();

        let response = service.dispatch(
            HookName::BlockBeforeSign,
            Slot::new(10),
            &Pubkey::from([1; 48]),
            None,
        );

        assert_eq!(response.cmd, Command::Null);
        assert_eq!(response.result, format!("{:?}", Hash256::repeat_byte(9)));
    }
}
