//! Creator earnings
//!
//! Each engagement type pays a fixed rate: `component = count × rate`.
//! A story's total is rounded to cents; a creator's portfolio total is the
//! rounded sum of the per-story rounded totals. Components themselves are not
//! rounded, so summing many stories does not accumulate rounding drift.

use branchtale_core::config::EarningsConfig;
use branchtale_core::{EngagementSnapshot, Story, StoryError, StoryStatus, StoryStore};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct EarningsBreakdown {
    pub views_earnings: f64,
    pub likes_earnings: f64,
    pub shares_earnings: f64,
    pub comments_earnings: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryEarnings {
    pub story_id: Uuid,
    pub title: String,
    pub status: StoryStatus,
    pub engagement: EngagementSnapshot,
    pub earnings: EarningsBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatorEarnings {
    pub creator_id: Uuid,
    pub story_count: usize,
    pub stories: Vec<StoryEarnings>,
    pub portfolio: EarningsBreakdown,
}

/// Round to two decimal places.
pub fn round_cents(amount: f64) -> f64 {
    if !amount.is_finite() {
        return 0.0;
    }
    (amount * 100.0).round() / 100.0
}

fn component(count: i64, rate: f64) -> f64 {
    let value = count.max(0) as f64 * rate;
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Pure payout breakdown. Negative counts count as zero.
pub fn calculate_earnings_breakdown(
    views: i64,
    likes: i64,
    shares: i64,
    comments: i64,
    rates: &EarningsConfig,
) -> EarningsBreakdown {
    let views_earnings = component(views, rates.view_rate);
    let likes_earnings = component(likes, rates.like_rate);
    let shares_earnings = component(shares, rates.share_rate);
    let comments_earnings = component(comments, rates.comment_rate);

    EarningsBreakdown {
        views_earnings,
        likes_earnings,
        shares_earnings,
        comments_earnings,
        total: round_cents(views_earnings + likes_earnings + shares_earnings + comments_earnings),
    }
}

pub fn story_earnings(story: &Story, rates: &EarningsConfig) -> StoryEarnings {
    let engagement = story.engagement().clamped();
    StoryEarnings {
        story_id: story.id,
        title: story.title.clone(),
        status: story.status,
        engagement,
        earnings: calculate_earnings_breakdown(
            engagement.views,
            engagement.likes,
            engagement.shares,
            engagement.comments,
            rates,
        ),
    }
}

/// Fold per-story breakdowns into a portfolio breakdown.
pub fn summarize_portfolio(stories: &[StoryEarnings]) -> EarningsBreakdown {
    let mut sum = EarningsBreakdown::default();
    for s in stories {
        sum.views_earnings += s.earnings.views_earnings;
        sum.likes_earnings += s.earnings.likes_earnings;
        sum.shares_earnings += s.earnings.shares_earnings;
        sum.comments_earnings += s.earnings.comments_earnings;
        sum.total += s.earnings.total;
    }
    EarningsBreakdown {
        views_earnings: round_cents(sum.views_earnings),
        likes_earnings: round_cents(sum.likes_earnings),
        shares_earnings: round_cents(sum.shares_earnings),
        comments_earnings: round_cents(sum.comments_earnings),
        total: round_cents(sum.total),
    }
}

/// Per-story and portfolio earnings for every story a creator authored.
pub async fn creator_earnings(
    store: &dyn StoryStore,
    creator_id: Uuid,
    rates: &EarningsConfig,
) -> Result<CreatorEarnings, StoryError> {
    let stories = store.list_stories_by_author(creator_id).await.map_err(|e| {
        tracing::error!(%creator_id, error = %e, "earnings: failed to load stories");
        e
    })?;

    let per_story: Vec<StoryEarnings> = stories.iter().map(|s| story_earnings(s, rates)).collect();
    let portfolio = summarize_portfolio(&per_story);

    tracing::debug!(%creator_id, stories = per_story.len(), total = portfolio.total, "earnings computed");

    Ok(CreatorEarnings {
        creator_id,
        story_count: per_story.len(),
        stories: per_story,
        portfolio,
    })
}
