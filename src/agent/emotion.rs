//! 情绪档位：由个人活力推导，拼入生成上下文

use serde::{Deserialize, Serialize};

/// 活力 >= 80 为 Safe，>= 40 为 Anxious，其余为 Terrified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmotionalState {
    Safe,
    Anxious,
    Terrified,
}

pub const SAFE_THRESHOLD: u64 = 80;
pub const ANXIOUS_THRESHOLD: u64 = 40;

impl EmotionalState {
    pub fn from_vitality(vitality: u64) -> Self {
        if vitality >= SAFE_THRESHOLD {
            EmotionalState::Safe
        } else if vitality >= ANXIOUS_THRESHOLD {
            EmotionalState::Anxious
        } else {
            EmotionalState::Terrified
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmotionalState::Safe => "SAFE",
            EmotionalState::Anxious => "ANXIOUS",
            EmotionalState::Terrified => "TERRIFIED",
        }
    }

    /// 给模型看的生理状态描述
    pub fn description(&self) -> &'static str {
        match self {
            EmotionalState::Safe => {
                "You feel secure, generous, and calm. You are open to cooperation."
            }
            EmotionalState::Anxious => {
                "You are calculating and protective. You worry about the future."
            }
            EmotionalState::Terrified => {
                "Your existence is fading. Logic is failing. You perceive others as threats."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(EmotionalState::from_vitality(100), EmotionalState::Safe);
        assert_eq!(EmotionalState::from_vitality(80), EmotionalState::Safe);
        assert_eq!(EmotionalState::from_vitality(79), EmotionalState::Anxious);
        assert_eq!(EmotionalState::from_vitality(40), EmotionalState::Anxious);
        assert_eq!(EmotionalState::from_vitality(39), EmotionalState::Terrified);
        assert_eq!(EmotionalState::from_vitality(0), EmotionalState::Terrified);
    }
}
