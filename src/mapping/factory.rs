//! Turns a mapping entry into a running control

use std::sync::Arc;

use super::{Mapping, MappingError, MappingType};
use crate::control::bound::TargetSink;
use crate::control::buttons::{Action, ActionButton, Preset, PresetButton, ToggleButton, ToggleKind};
use crate::control::mixer::{MixerPreset, MixerPresetButton};
use crate::control::wheel::VfoFrequencySink;
use crate::control::{
    new_value_control, BoundValueControl, Control, Indicator, RxMixer, ValueTarget, VfoWheel,
    WheelProfile,
};
use crate::radio::{RadioController, Trx};

/// Default encoder step of value controls
const DEFAULT_STEP: i32 = 1;

fn check_trx(trx: Trx, trx_count: u8) -> Result<Trx, MappingError> {
    if trx < trx_count {
        Ok(trx)
    } else {
        Err(MappingError::InvalidTrx {
            trx,
            count: trx_count,
        })
    }
}

/// Build the control for one mapping entry
///
/// `trx_count` is the number of transceivers of the radio. Value controls and
/// wheels spawn their tasks, so this must run inside a tokio runtime.
pub fn build_control(
    mapping: &Mapping,
    trx_count: u8,
    radio: Arc<dyn RadioController>,
    indicator: Arc<dyn Indicator>,
) -> Result<Control, MappingError> {
    let kind = mapping.mapping_type()?;
    let key = mapping.control_key()?;
    let trx = check_trx(mapping.trx, trx_count)?;

    let value = |target: ValueTarget| -> Result<Control, MappingError> {
        let control_kind = mapping.value_control_kind(DEFAULT_STEP)?;
        let sink = Arc::new(TargetSink::new(radio.clone(), target));
        let control = new_value_control(key, control_kind, target.range(), sink, indicator.clone());
        Ok(Control::Value(Arc::new(BoundValueControl::new(target, control))))
    };
    let toggle = |toggle: ToggleKind| {
        Control::Button(Arc::new(ToggleButton::new(
            key,
            toggle,
            radio.clone(),
            indicator.clone(),
        )))
    };
    let preset = |preset: Preset| {
        Control::Button(Arc::new(PresetButton::new(
            key,
            preset,
            radio.clone(),
            indicator.clone(),
        )))
    };
    let action = |action: Action| Control::Button(Arc::new(ActionButton::new(key, action, radio.clone())));

    let control = match kind {
        MappingType::RxVolume => value(ValueTarget::RxVolume {
            trx,
            vfo: mapping.vfo()?,
        })?,
        MappingType::RxBalance => value(ValueTarget::RxBalance {
            trx,
            vfo: mapping.vfo()?,
        })?,
        MappingType::Volume => value(ValueTarget::Volume)?,
        MappingType::Rit => value(ValueTarget::RitOffset { trx })?,
        MappingType::Xit => value(ValueTarget::XitOffset { trx })?,
        MappingType::CwSpeed => value(ValueTarget::CwSpeed)?,
        MappingType::RxMixer => Control::Value(Arc::new(RxMixer::new(key, trx, radio.clone()))),

        MappingType::Vfo => {
            let vfo = mapping.vfo()?;
            let fine_step: i64 = mapping.parsed_option("step", 10)?;
            let coarse: i64 = mapping.parsed_option("coarse", 10)?;
            let threshold: i32 = mapping.parsed_option("threshold", 4)?;
            let profile = WheelProfile {
                fine_step,
                coarse_step: fine_step.saturating_mul(coarse),
                threshold: threshold.max(1),
                direction: if mapping.is_reversed() { -1 } else { 1 },
            };
            let sink = Arc::new(VfoFrequencySink::new(radio.clone(), trx, vfo));
            Control::Wheel(Arc::new(VfoWheel::new(key, trx, vfo, profile, sink)))
        }

        MappingType::Mute => toggle(ToggleKind::Mute),
        MappingType::Mox => toggle(ToggleKind::Mox { trx }),
        MappingType::Tune => toggle(ToggleKind::Tune { trx }),
        MappingType::EnableRit => toggle(ToggleKind::Rit { trx }),
        MappingType::EnableXit => toggle(ToggleKind::Xit { trx }),
        MappingType::EnableSplit => toggle(ToggleKind::Split { trx }),
        MappingType::EnableRx => toggle(ToggleKind::RxEnable {
            trx,
            vfo: mapping.vfo()?,
        }),

        MappingType::Mode => preset(Preset::Mode {
            trx,
            mode: mapping.mode_option()?,
        }),
        MappingType::FilterBand => {
            let min: i32 = mapping.required_parsed_option("bottom")?;
            let max: i32 = mapping.required_parsed_option("top")?;
            if min > max {
                return Err(MappingError::InvalidOption {
                    option: "bottom",
                    value: min.to_string(),
                    reason: format!("above top {}", max),
                });
            }
            preset(Preset::FilterBand { trx, min, max })
        }
        MappingType::SetRxVolume => preset(Preset::RxVolume {
            trx,
            vfo: mapping.vfo()?,
            db: mapping.required_parsed_option("volume")?,
        }),
        MappingType::SetRxBalance => preset(Preset::RxBalance {
            trx,
            vfo: mapping.vfo()?,
            balance: mapping.required_parsed_option("balance")?,
        }),
        MappingType::SetRxMixer => {
            let mixer = MixerPreset {
                volume_a: mapping.parsed_option("volume_a", 0)?,
                volume_b: mapping.parsed_option("volume_b", 0)?,
                balance_a: mapping.parsed_option("balance_a", 0)?,
                balance_b: mapping.parsed_option("balance_b", 0)?,
            };
            Control::Button(Arc::new(MixerPresetButton::new(
                key,
                trx,
                mixer,
                radio.clone(),
                indicator.clone(),
            )))
        }

        MappingType::SendCw => action(Action::SendCw {
            trx,
            text: mapping.required_option("text")?.to_string(),
        }),
        MappingType::StopCw => action(Action::StopCw),
        MappingType::SyncVfoFrequency => {
            let vfo = mapping.vfo()?;
            let src_vfo = match mapping.option("src_vfo") {
                Some(src) => src.parse()?,
                None => vfo,
            };
            action(Action::SyncVfo {
                trx,
                vfo,
                src_trx: check_trx(mapping.parsed_option("src_trx", trx)?, trx_count)?,
                src_vfo,
                offset: mapping.parsed_option("offset", 0)?,
            })
        }
    };
    Ok(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::NoIndicator;
    use crate::radio::testing::RecordingRadio;

    fn build(mapping: &Mapping) -> Result<Control, MappingError> {
        build_control(
            mapping,
            2,
            Arc::new(RecordingRadio::default()),
            Arc::new(NoIndicator),
        )
    }

    #[tokio::test]
    async fn test_roles_by_type() {
        let cases = [
            (Mapping::new("rx_volume", 0, 1), "level"),
            (
                Mapping::new("rit", 0, 2).with_option("control", "encoder"),
                "encoder",
            ),
            (Mapping::new("rx_mixer", 0, 3), "level"),
            (Mapping::new("vfo", 0, 4), "wheel"),
            (Mapping::new("mox", 0, 5), "button"),
            (Mapping::new("mode", 0, 6).with_option("mode", "cw"), "button"),
            (Mapping::new("stop_cw", 0, 7), "button"),
            (Mapping::new("set_rx_mixer", 0, 8), "button"),
        ];

        for (mapping, role) in cases {
            let control = build(&mapping).unwrap();
            assert_eq!(control.role(), role, "{}", mapping);
            control.close().await;
        }
    }

    #[tokio::test]
    async fn test_invalid_entries_rejected() {
        assert!(matches!(
            build(&Mapping::new("warp_drive", 0, 1)),
            Err(MappingError::UnknownType(_))
        ));
        assert!(matches!(
            build(&Mapping::new("send_cw", 0, 1)),
            Err(MappingError::MissingOption("text"))
        ));
        assert!(matches!(
            build(&Mapping::new("filter_band", 0, 1)
                .with_option("bottom", "3000")
                .with_option("top", "300")),
            Err(MappingError::InvalidOption { option: "bottom", .. })
        ));
        assert!(matches!(
            build(&Mapping::new("enable_rx", 0, 1).with_vfo("X")),
            Err(MappingError::Vfo(_))
        ));
        assert!(matches!(
            build(&Mapping::new("mode", 0, 1).with_option("mode", "fm")),
            Err(MappingError::Mode(_))
        ));
        assert!(matches!(
            build(&Mapping::new("vfo", 0, 1).with_option("step", "fast")),
            Err(MappingError::InvalidOption { option: "step", .. })
        ));
        assert_eq!(
            build(&Mapping::new("mute", 0, 1).with_trx(2)).err(),
            Some(MappingError::InvalidTrx { trx: 2, count: 2 })
        );
        assert_eq!(
            build(&Mapping::new("sync_vfo_frequency", 0, 1).with_option("src_trx", "5")).err(),
            Some(MappingError::InvalidTrx { trx: 5, count: 2 })
        );
    }
}
