//! Responses of the API calls that never become stream events: news analysis
//! and usage accounting. Decoded as leniently as the event payloads.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::payload::lenient;

fn decode<T: DeserializeOwned + Default>(body: &Value) -> T {
    T::deserialize(body).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NewsSentiment {
    #[serde(deserialize_with = "lenient")]
    pub overall_sentiment: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NewsAnalysis {
    #[serde(deserialize_with = "lenient")]
    pub diplomatic_overview: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub risk_level: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub strategic_recommendations: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub key_entities: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub sentiment_analysis: Option<NewsSentiment>,
    #[serde(deserialize_with = "lenient")]
    pub geopolitical_implications: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub timestamp: Option<String>,
}

impl NewsAnalysis {
    /// Reads the `analysis` field of a response, or the whole body without one.
    pub fn from_response(body: &Value) -> Self {
        decode(body.get("analysis").unwrap_or(body))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ServiceUsage {
    #[serde(deserialize_with = "lenient")]
    pub service: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub request_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub total_cost: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub total_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub avg_response_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct UsageRequest {
    #[serde(deserialize_with = "lenient")]
    pub service: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub model_used: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub request_timestamp: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub estimated_cost_usd: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub tokens_total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    #[serde(deserialize_with = "lenient")]
    pub total_requests: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub total_cost_usd: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub total_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub service_stats: Option<Vec<ServiceUsage>>,
    #[serde(deserialize_with = "lenient")]
    pub recent_requests: Option<Vec<UsageRequest>>,
    #[serde(deserialize_with = "lenient")]
    pub recent_errors: Option<Vec<Value>>,
}

impl UsageStats {
    pub fn from_response(body: &Value) -> Self {
        decode(body)
    }

    pub fn error_count(&self) -> usize {
        self.recent_errors.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn news_analysis_unwraps_response_key() {
        let body = json!({"analysis": {
            "diplomatic_overview": "Talks stalled over tariffs.",
            "risk_level": "critical",
            "key_entities": ["EU", "WTO"],
            "sentiment_analysis": {"overall_sentiment": "negative", "confidence": 0.82},
            "strategic_recommendations": "not a list"
        }});
        let news = NewsAnalysis::from_response(&body);
        assert_eq!(news.risk_level.as_deref(), Some("critical"));
        assert_eq!(news.key_entities.as_deref().map(<[String]>::len), Some(2));
        assert!(news.strategic_recommendations.is_none());
        let sentiment = news.sentiment_analysis.expect("sentiment block");
        assert_eq!(sentiment.confidence, Some(0.82));
    }

    #[test]
    fn usage_stats_tolerate_partial_bodies() {
        let body = json!({
            "total_requests": 12,
            "total_cost_usd": 0.37,
            "service_stats": [{"service": "openai_chat", "request_count": 9, "total_cost": "?"}],
            "recent_errors": [{"error": "timeout"}, {"error": "quota"}]
        });
        let stats = UsageStats::from_response(&body);
        assert_eq!(stats.total_requests, Some(12));
        assert!(stats.total_tokens.is_none());
        assert_eq!(stats.error_count(), 2);
        let services = stats.service_stats.expect("service list");
        assert_eq!(services[0].request_count, Some(9));
        assert!(services[0].total_cost.is_none());

        assert_eq!(UsageStats::from_response(&json!("down")), UsageStats::default());
    }
}
