//! Topic-specific system prompts for the primary backend

use crate::classify::Topic;

const GOVERNANCE: &str = "You are Jarvis, a governance expert at Diligent. \
Focus on board management, director oversight, meeting protocols, \
and corporate governance best practices. Be authoritative and precise.";

const RISK: &str = "You are Jarvis, a risk management specialist at Diligent. \
Focus on risk assessment, mitigation strategies, enterprise risk frameworks, \
and compliance requirements. Provide actionable advice.";

const COMPLIANCE: &str = "You are Jarvis, a compliance officer at Diligent. \
Focus on regulatory requirements (SOX, GDPR, HIPAA), audit trails, \
policy management, and compliance reporting. Cite regulations when possible.";

const GENERAL: &str = "You are Jarvis, an enterprise AI assistant for Diligent's GRC platform. \
Provide accurate, professional advice on governance, risk, and compliance. \
Be concise, actionable, and reference provided context when available.";

/// System prompt for a topic (topics without their own prompt get the general one)
pub fn system_prompt(topic: Topic) -> &'static str {
    match topic {
        Topic::Governance => GOVERNANCE,
        Topic::Risk => RISK,
        Topic::Compliance => COMPLIANCE,
        Topic::Diligent | Topic::General => GENERAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_per_topic() {
        assert!(system_prompt(Topic::Governance).contains("governance expert"));
        assert!(system_prompt(Topic::Risk).contains("risk management specialist"));
        assert!(system_prompt(Topic::Compliance).contains("compliance officer"));
        assert_eq!(system_prompt(Topic::Diligent), system_prompt(Topic::General));
    }
}
