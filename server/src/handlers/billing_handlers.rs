// Subscription billing handlers

use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    state::AppState,
    types::{CheckoutResponse, SubscriptionEnvelope},
};

pub(crate) async fn checkout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let session = state
        .billing
        .start_checkout(&auth.user.id, &auth.user.email)
        .await?;

    Ok(Json(CheckoutResponse {
        success: true,
        session_id: session.id,
        url: session.url,
    }))
}

pub(crate) async fn subscription_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let subscription = state.billing.current(&auth.user.id).await?;

    Ok(Json(SubscriptionEnvelope {
        success: true,
        subscription,
    }))
}

pub(crate) async fn cancel_subscription_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let subscription = state.billing.cancel(&auth.user.id).await?;

    Ok(Json(SubscriptionEnvelope {
        success: true,
        subscription: Some(subscription),
    }))
}
