use std::sync::Arc;
use std::time::Instant;

use gobuddy_core::{
    ChatMessage, FeedbackRequest, PreferenceUpdate, RecommendationRequest,
    RecommendationResponse, TripItinerary, TripPlanRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::knowledge::KnowledgeBase;
use crate::llm::{AgentClient, AgentError, AgentRequest};
use crate::prompts;
use crate::quick_response::QuickResponseMatcher;
use crate::roles::{AgentRole, TRIP_PLANNER_TEAM};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripPlan {
    pub destination: String,
    pub duration_days: u32,
    pub budget: Option<f64>,
    pub travel_style: String,
    pub plan: String,
    pub agents_used: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SupportAnswer {
    Quick { answer: String, quick_response: bool, agent: &'static str },
    Agent { answer: String, sources_used: bool, agent: &'static str },
}

impl SupportAnswer {
    pub fn answer(&self) -> &str {
        match self {
            Self::Quick { answer, .. } | Self::Agent { answer, .. } => answer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub recommendations: String,
    pub user_id: String,
    pub personalized: bool,
    pub agent: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PreferenceAck {
    pub updated: bool,
    pub preference_type: String,
    pub preference_value: String,
    pub acknowledgment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackAck {
    pub feedback_recorded: bool,
    pub destination: String,
    pub rating: Option<u8>,
    pub agent_response: String,
}

/// Trip planner team, support bot and recommender on top of one agent backend.
#[derive(Clone)]
pub struct AgentRuntime {
    client: Arc<dyn AgentClient>,
    knowledge: KnowledgeBase,
    reference: Option<Arc<str>>,
    quick_responses: QuickResponseMatcher,
}

impl AgentRuntime {
    pub fn new(client: Arc<dyn AgentClient>, knowledge: KnowledgeBase) -> Self {
        let reference = knowledge.reference_material();
        Self { client, knowledge, reference, quick_responses: QuickResponseMatcher::default() }
    }

    pub fn with_quick_responses(mut self, quick_responses: QuickResponseMatcher) -> Self {
        self.quick_responses = quick_responses;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub async fn plan_trip(
        &self,
        request: &TripPlanRequest,
        user_id: Option<&str>,
    ) -> Result<TripPlan, AgentError> {
        let plan = self.run_team(&prompts::trip_plan_prompt(request), user_id).await?;
        Ok(TripPlan {
            destination: request.destination.clone(),
            duration_days: request.duration_days,
            budget: request.budget,
            travel_style: request.travel_style.clone(),
            plan,
            agents_used: TRIP_PLANNER_TEAM.iter().map(|role| role.name()).collect(),
        })
    }

    pub async fn plan_trip_structured(
        &self,
        request: &TripPlanRequest,
        user_id: Option<&str>,
    ) -> Result<TripItinerary, AgentError> {
        let plan = self.run_team(&prompts::trip_plan_prompt(request), user_id).await?;
        let prompt = prompts::trip_format_prompt(&plan, request);
        let itinerary: TripItinerary =
            self.invoke_structured(AgentRole::TripFormatter, prompt, user_id).await?;
        itinerary.validate().map_err(|errors| AgentError::MalformedOutput(errors.to_string()))?;
        Ok(itinerary)
    }

    /// Canned answer when the question hits the quick-response table, otherwise the support agent.
    pub async fn answer_question(
        &self,
        message: &ChatMessage,
        user_id: Option<&str>,
    ) -> Result<SupportAnswer, AgentError> {
        if let Some(rule) = self.quick_responses.find(&message.message) {
            info!(event_name = "support.quick_response", category = %rule.category, "answered from quick-response table");
            return Ok(SupportAnswer::Quick {
                answer: rule.response.clone(),
                quick_response: true,
                agent: AgentRole::SupportBot.name(),
            });
        }

        let prompt = prompts::support_prompt(&message.message, message.context.as_ref());
        let request = AgentRequest::text(AgentRole::SupportBot, prompt, user_id)
            .with_reference(self.reference.clone());
        let answer = self.invoke(request).await?;

        Ok(SupportAnswer::Agent {
            answer,
            sources_used: !self.knowledge.is_empty(),
            agent: AgentRole::SupportBot.name(),
        })
    }

    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
        user_id: &str,
    ) -> Result<Recommendations, AgentError> {
        let prompt = prompts::recommendation_prompt(request);
        let recommendations = self
            .invoke(AgentRequest::text(AgentRole::TravelRecommender, prompt, Some(user_id)))
            .await?;

        Ok(Recommendations {
            recommendations,
            user_id: user_id.to_owned(),
            personalized: true,
            agent: AgentRole::TravelRecommender.name(),
        })
    }

    pub async fn get_structured_recommendations(
        &self,
        request: &RecommendationRequest,
        user_id: &str,
    ) -> Result<RecommendationResponse, AgentError> {
        let prose = self.get_recommendations(request, user_id).await?.recommendations;
        let prompt = prompts::recommendation_format_prompt(&prose, request.num_recommendations);
        let response: RecommendationResponse = self
            .invoke_structured(AgentRole::RecommendationFormatter, prompt, Some(user_id))
            .await?;
        response.validate().map_err(|errors| AgentError::MalformedOutput(errors.to_string()))?;
        Ok(response)
    }

    pub async fn update_preferences(
        &self,
        update: &PreferenceUpdate,
        user_id: &str,
    ) -> Result<PreferenceAck, AgentError> {
        let prompt = prompts::preference_prompt(update);
        let acknowledgment = self
            .invoke(AgentRequest::text(AgentRole::TravelRecommender, prompt, Some(user_id)))
            .await?;

        Ok(PreferenceAck {
            updated: true,
            preference_type: update.preference_type.clone(),
            preference_value: update.preference_value.clone(),
            acknowledgment,
        })
    }

    pub async fn provide_feedback(
        &self,
        feedback: &FeedbackRequest,
        user_id: &str,
    ) -> Result<FeedbackAck, AgentError> {
        let prompt = prompts::feedback_prompt(feedback);
        let agent_response = self
            .invoke(AgentRequest::text(AgentRole::TravelRecommender, prompt, Some(user_id)))
            .await?;

        Ok(FeedbackAck {
            feedback_recorded: true,
            destination: feedback.destination.clone(),
            rating: feedback.rating,
            agent_response,
        })
    }

    /// Sequential hand-off; the last member's output is the team result.
    async fn run_team(&self, task: &str, user_id: Option<&str>) -> Result<String, AgentError> {
        let mut contributions: Vec<(&str, String)> = Vec::with_capacity(TRIP_PLANNER_TEAM.len());

        for role in TRIP_PLANNER_TEAM {
            let prompt = prompts::team_handoff_prompt(task, &contributions);
            let output = self.invoke(AgentRequest::text(role, prompt, user_id)).await?;
            contributions.push((role.name(), output));
        }

        Ok(contributions.pop().map(|(_, output)| output).unwrap_or_default())
    }

    async fn invoke(&self, request: AgentRequest) -> Result<String, AgentError> {
        let role = request.role;
        let started = Instant::now();
        let result = self.client.invoke(request).await;
        log_outcome(role, started, &result);
        result.map(|output| output.into_text())
    }

    async fn invoke_structured<T: DeserializeOwned>(
        &self,
        role: AgentRole,
        prompt: String,
        user_id: Option<&str>,
    ) -> Result<T, AgentError> {
        let started = Instant::now();
        let result = self.client.invoke(AgentRequest::json(role, prompt, user_id)).await;
        log_outcome(role, started, &result);
        let value = result?.into_structured()?;
        serde_json::from_value(value).map_err(|error| AgentError::MalformedOutput(error.to_string()))
    }
}

fn log_outcome<T>(role: AgentRole, started: Instant, result: &Result<T, AgentError>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => info!(
            event_name = "agent.invoked",
            agent = role.name(),
            elapsed_ms,
            "agent call completed"
        ),
        Err(error) => warn!(
            event_name = "agent.invoke_failed",
            agent = role.name(),
            elapsed_ms,
            error = %error,
            "agent call failed"
        ),
    }
}
