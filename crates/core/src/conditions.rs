//! Targeting condition evaluation.
//!
//! Dimensions are checked in a fixed order and the first failing one is
//! reported: environment, tenant, role, subscription plan.

use flaggate_domain::{ConditionFailure, EvaluationContext, FlagConditions};

/// Check `context` against `conditions`.
///
/// Absent conditions, or conditions with every dimension empty, allow any
/// context. A restricted dimension rejects a context whose value is absent
/// or not in the allow-list.
///
/// # Errors
/// The first dimension, in evaluation order, that rejected the context.
pub fn evaluate_conditions(
    conditions: Option<&FlagConditions>,
    context: &EvaluationContext,
) -> Result<(), ConditionFailure> {
    let Some(conditions) = conditions else {
        return Ok(());
    };

    let checks = [
        (&conditions.environments, &context.environment, ConditionFailure::Environment),
        (&conditions.tenant_ids, &context.tenant_id, ConditionFailure::Tenant),
        (&conditions.user_roles, &context.user_role, ConditionFailure::Role),
        (
            &conditions.subscription_plans,
            &context.subscription_plan,
            ConditionFailure::SubscriptionPlan,
        ),
    ];

    for (allowed, value, failure) in checks {
        if !dimension_allows(allowed, value.as_deref()) {
            return Err(failure);
        }
    }

    Ok(())
}

fn dimension_allows(allowed: &[String], value: Option<&str>) -> bool {
    allowed.is_empty() || value.is_some_and(|value| allowed.iter().any(|a| a == value))
}
