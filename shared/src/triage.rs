//! Triage Classifier
//!
//! Maps an injury type to a dispatch priority and decides whether the case
//! warrants an immediate, synchronous dispatch attempt. Pure and total over
//! every `InjuryType`, including values this build does not recognise.

use crate::{InjuryCategory, InjuryType, Priority};

/// Injuries that require a drone to be sent immediately
pub const CRITICAL_INJURIES: [InjuryType; 7] = [
    InjuryType::HeavyBleeding,
    InjuryType::BreathingDifficulty,
    InjuryType::HeadInjury,
    InjuryType::NeckInjury,
    InjuryType::SpinalInjury,
    InjuryType::PostpartumHemorrhage,
    InjuryType::GbvEmergency,
];

/// Priority for an injury type
pub fn classify(injury_type: InjuryType) -> Priority {
    use InjuryType::*;

    match injury_type {
        HeavyBleeding | BreathingDifficulty | HeadInjury | NeckInjury | SpinalInjury
        | PostpartumHemorrhage | GbvEmergency => Priority::Emergency,

        PostpartumInfection | GbvPhysical | ChronicCardiac | ChronicRespiratory => Priority::High,

        ChronicDiabetic | Other => Priority::Normal,

        // Fail closed
        Unknown => Priority::Normal,
    }
}

/// Whether submission should attempt dispatch synchronously instead of
/// waiting for the next scheduling pass
pub fn requires_immediate_dispatch(injury_type: InjuryType) -> bool {
    CRITICAL_INJURIES.contains(&injury_type)
}

/// Category a known injury type is filed under. `None` for `Unknown`.
pub fn category_of(injury_type: InjuryType) -> Option<InjuryCategory> {
    use InjuryType::*;

    let category = match injury_type {
        HeavyBleeding | BreathingDifficulty | HeadInjury | NeckInjury | SpinalInjury => {
            InjuryCategory::Trauma
        }
        PostpartumHemorrhage | PostpartumInfection => InjuryCategory::Postpartum,
        GbvPhysical | GbvEmergency => InjuryCategory::Gbv,
        ChronicCardiac | ChronicDiabetic | ChronicRespiratory => InjuryCategory::Chronic,
        Other => InjuryCategory::Other,
        Unknown => return None,
    };
    Some(category)
}

/// First-aid guidance shown to the requester while a drone is on the way.
///
/// Types without guidance of their own, including unrecognised ones, get
/// the general advice listed for `Other`.
pub fn first_aid_tips(injury_type: InjuryType) -> &'static [&'static str] {
    use InjuryType::*;

    match injury_type {
        HeavyBleeding => &[
            "Apply direct pressure to the wound with a clean cloth",
            "Elevate the injured area above heart level if possible",
            "Do not remove any objects embedded in the wound",
            "Keep the person calm and still",
            "Monitor for signs of shock (pale skin, rapid breathing)",
        ],
        BreathingDifficulty => &[
            "Help the person sit upright or in a comfortable position",
            "Loosen any tight clothing around neck and chest",
            "Stay calm and encourage slow, deep breaths",
            "Do not give food or water",
            "If the person has a prescribed inhaler, help them use it",
        ],
        HeadInjury => &[
            "Keep the person still and do not move their head or neck",
            "Apply gentle pressure if bleeding, but not directly on the wound",
            "Watch for changes in consciousness or behavior",
            "Do not give any medications",
            "Keep the person awake if possible",
        ],
        NeckInjury => &[
            "Do not move the person unless absolutely necessary",
            "Stabilize the head and neck in the position found",
            "If they must be moved, support head and neck as a unit",
            "Monitor breathing and consciousness",
            "Keep the person warm with blankets if available",
        ],
        SpinalInjury => &[
            "Do not move the person, movement can cause permanent damage",
            "Keep the person completely still",
            "Place rolled towels or clothing on either side of the neck",
            "Monitor breathing without moving them",
            "Reassure the person and keep them calm",
        ],
        PostpartumHemorrhage => &[
            "Keep the mother lying down with legs elevated",
            "Massage the uterus gently (lower abdomen)",
            "Encourage breastfeeding if the baby is present",
            "Keep the mother warm and monitor consciousness",
            "Collect and estimate blood loss if possible",
        ],
        PostpartumInfection => &[
            "Keep the mother comfortable and hydrated",
            "Monitor temperature if a thermometer is available",
            "Note any discharge characteristics",
            "Keep the area clean",
            "Do not give unprescribed antibiotics",
        ],
        GbvPhysical => &[
            "Ensure the person is in a safe location",
            "Provide emotional support and privacy",
            "Document injuries if the person consents",
            "Do not pressure the person to make decisions",
            "Respect their choices and autonomy",
        ],
        GbvEmergency => &[
            "Prioritize immediate safety",
            "Help the person to a safe, private location",
            "Provide emotional support",
            "Do not ask for details of the incident",
            "Respect privacy and confidentiality",
        ],
        ChronicCardiac => &[
            "Help the person sit or lie in a comfortable position",
            "If the person has nitroglycerin, help them take it",
            "Loosen tight clothing",
            "Monitor breathing and consciousness",
            "If the person becomes unconscious, prepare for CPR",
        ],
        ChronicDiabetic => &[
            "If conscious and able to swallow, give sugar (juice, candy)",
            "Do not give insulin without confirmation of blood sugar",
            "Help the person sit or lie down",
            "Monitor consciousness",
            "If unconscious, do not give anything by mouth",
        ],
        ChronicRespiratory => &[
            "Help the person sit upright",
            "Assist with prescribed medications (inhalers)",
            "Ensure good airflow in the area",
            "Encourage pursed-lip breathing",
            "Stay calm and provide reassurance",
        ],
        Other | Unknown => &[
            "Keep the person calm and comfortable",
            "Monitor vital signs if possible",
            "Note any symptoms and their progression",
            "Do not give unprescribed medications",
            "Provide reassurance that help is coming",
        ],
    }
}

/// Injury types offered under a category
pub fn injuries_in(category: InjuryCategory) -> Vec<InjuryType> {
    InjuryType::KNOWN
        .iter()
        .copied()
        .filter(|t| category_of(*t) == Some(category))
        .collect()
}
