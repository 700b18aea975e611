//! Event → classification → plan
//!
//! The decision half of the pipeline. It holds no state between events and
//! is safe to call from any number of threads at once.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::classifier::{classify, Classification, Reason};
use crate::collaborators::{CdromRegistry, SharingCheck};
use crate::event::DeviceEvent;
use crate::planner::{plan, Action};

/// Everything decided about one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// The event, if it could be parsed
    pub event: Option<DeviceEvent>,
    pub classification: Classification,
    pub actions: Vec<Action>,
}

impl Decision {
    fn ignored(reason: Reason) -> Self {
        Self {
            event: None,
            classification: Classification::ignore(reason),
            actions: Vec::new(),
        }
    }
}

/// Classify and plan one event
pub fn decide(event: DeviceEvent, registry: &dyn CdromRegistry, sharing: &dyn SharingCheck) -> Decision {
    let classification = classify(&event, registry);
    tracing::debug!(
        %event,
        category = ?classification.category,
        reason = %classification.reason,
        "classified"
    );

    let actions = plan(&event, classification.category, sharing);
    tracing::debug!(%event, actions = actions.len(), "planned");

    Decision {
        event: Some(event),
        classification,
        actions,
    }
}

/// Classify and plan from a udev environment
///
/// A malformed environment is ignored rather than reported as an error.
pub fn decide_env(
    vars: &HashMap<String, String>,
    sys_root: &Path,
    registry: &dyn CdromRegistry,
    sharing: &dyn SharingCheck,
) -> Decision {
    match DeviceEvent::from_env(vars, sys_root) {
        Ok(event) => decide(event, registry, sharing),
        Err(e) => {
            tracing::debug!("ignoring malformed event: {}", e);
            Decision::ignored(Reason::Malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DeviceCategory;
    use crate::collaborators::{FixedSharing, KnownDrives, Unavailable};
    use crate::event::DeviceAction;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decide_usb_stick() {
        let event = DeviceEvent::block("sdb", DeviceAction::Add).with_subsystems(["usb"]);
        let decision = decide(event, &KnownDrives::default(), &FixedSharing(true));

        assert_eq!(decision.classification.category, DeviceCategory::UsbBlock);
        assert_eq!(decision.actions.len(), 2);
        assert!(decision.event.is_some());
    }

    #[test]
    fn test_decide_env_malformed() {
        let vars = env(&[("ACTION", "bind"), ("SUBSYSTEM", "block"), ("KERNEL", "sdb")]);
        let decision = decide_env(&vars, Path::new("/nonexistent"), &Unavailable, &Unavailable);

        assert_eq!(decision.classification, Classification::ignore(Reason::Malformed));
        assert!(decision.actions.is_empty());
        assert!(decision.event.is_none());
    }

    #[test]
    fn test_decide_env_cdrom() {
        let vars = env(&[("ACTION", "add"), ("SUBSYSTEM", "block"), ("DEVNAME", "/dev/sr0")]);
        let decision = decide_env(
            &vars,
            Path::new("/nonexistent"),
            &KnownDrives::new(["sr0"]),
            &Unavailable,
        );

        assert_eq!(decision.classification.category, DeviceCategory::CdromConfirmed);
        assert_eq!(decision.actions.len(), 3);
    }

    #[test]
    fn test_decide_env_non_block() {
        let vars = env(&[("ACTION", "add"), ("SUBSYSTEM", "usb"), ("KERNEL", "1-1")]);
        let decision = decide_env(&vars, Path::new("/nonexistent"), &Unavailable, &FixedSharing(true));

        assert_eq!(decision.classification.reason, Reason::NotBlock);
        assert!(decision.actions.is_empty());
    }
}
