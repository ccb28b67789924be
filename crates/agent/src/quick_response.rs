//! Canned answers for support questions that never need the model.

const CONTACT_RESPONSE: &str = "You can reach GoBuddy Adventures support through:

- **Email**: support@gobuddy.com
- **Phone**: +1-800-GO-BUDDY (Available 24/7)
- **WhatsApp**: +1-555-123-4567

For urgent matters during your trip, use the emergency contact provided in your trip details.";

const CANCELLATION_RESPONSE: &str = "For cancellation and refund requests:

- **14+ days before trip**: Full refund
- **7-14 days before trip**: 50% refund
- **Less than 7 days**: No refund (credit may be available)

To cancel, please email support@gobuddy.com with your booking reference.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickResponseRule {
    pub category: String,
    keywords: Vec<String>,
    pub response: String,
}

impl QuickResponseRule {
    pub fn new<K, S>(category: impl Into<String>, keywords: K, response: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            category: category.into(),
            keywords: keywords.into_iter().map(|keyword| keyword.as_ref().to_lowercase()).collect(),
            response: response.into(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches(&self, lowered_question: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered_question.contains(keyword.as_str()))
    }
}

/// Ordered rule table; the first rule with a keyword in the question wins.
#[derive(Clone, Debug)]
pub struct QuickResponseMatcher {
    rules: Vec<QuickResponseRule>,
}

impl Default for QuickResponseMatcher {
    fn default() -> Self {
        Self::new(vec![
            QuickResponseRule::new(
                "contact",
                ["contact", "phone", "email", "reach", "call"],
                CONTACT_RESPONSE,
            ),
            QuickResponseRule::new(
                "cancellation",
                ["cancel", "refund", "change booking"],
                CANCELLATION_RESPONSE,
            ),
        ])
    }
}

impl QuickResponseMatcher {
    pub fn new(rules: Vec<QuickResponseRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[QuickResponseRule] {
        &self.rules
    }

    /// Case-insensitive substring match against each rule's keywords.
    pub fn find(&self, question: &str) -> Option<&QuickResponseRule> {
        let lowered = question.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&lowered))
    }
}
