//! Built-in enterprise facts loaded at startup

/// One seed fact
pub struct SeedFact {
    pub text: &'static str,
    pub category: &'static str,
    pub source: &'static str,
    pub tags: &'static [&'static str],
}

pub const SEED_FACTS: &[SeedFact] = &[
    SeedFact {
        text: "Diligent is the leading GRC SaaS company serving 1M+ users across 25,000 organizations worldwide with governance, risk, and compliance solutions.",
        category: "company",
        source: "company_overview",
        tags: &["diligent", "grc", "enterprise"],
    },
    SeedFact {
        text: "Effective board governance requires quarterly meetings, annual evaluations, secure document management, and clear committee structures with defined responsibilities.",
        category: "governance",
        source: "best_practices",
        tags: &["board", "governance", "meetings"],
    },
    SeedFact {
        text: "SOX compliance mandates internal controls over financial reporting, CEO/CFO certifications, audit trails, and regular independent audits.",
        category: "compliance",
        source: "regulations",
        tags: &["sox", "compliance", "audit"],
    },
    SeedFact {
        text: "Enterprise Risk Management (ERM) framework includes risk identification, assessment, mitigation planning, monitoring, and reporting to stakeholders.",
        category: "risk",
        source: "framework",
        tags: &["erm", "risk", "management"],
    },
    SeedFact {
        text: "Modern board portals should feature secure document distribution, electronic signatures, meeting scheduling, voting tools, and compliance tracking capabilities.",
        category: "technology",
        source: "product_features",
        tags: &["board_portal", "features", "technology"],
    },
    SeedFact {
        text: "GDPR compliance requires data protection impact assessments, breach notification within 72 hours, data minimization, and privacy by design principles.",
        category: "compliance",
        source: "regulations",
        tags: &["gdpr", "privacy", "data_protection"],
    },
    SeedFact {
        text: "Risk assessment involves identifying potential threats, analyzing their likelihood and impact, and prioritizing mitigation efforts based on risk appetite.",
        category: "risk",
        source: "process",
        tags: &["risk_assessment", "methodology"],
    },
];
