use crate::announcements::controls::{Control, ControlId};
use crate::announcements::error::AnnouncementError;
use crate::announcements::view::{self, Screen};
use crate::{Data, Error};

use chrono::Utc;
use poise::serenity_prelude as serenity;
use serenity::{
    ComponentInteraction, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, Interaction, ModalInteraction,
};

/// Answer for a control that failed before anything was sent back. A missing
/// announcement replaces the draft with the expired screen, anything else is
/// told only to the user who pressed the control.
fn error_response(error: &AnnouncementError) -> CreateInteractionResponse {
    match error {
        AnnouncementError::NotFound(_) => {
            CreateInteractionResponse::UpdateMessage(Screen::expired().update_message())
        }
        error => CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(format!("🔥 {}", error.user_message()))
                .ephemeral(true),
        ),
    }
}

/// Routes announcement buttons and forms. Interactions belonging to anything
/// else are ignored.
pub async fn interaction_create(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &Interaction,
) -> Result<(), Error> {
    match interaction {
        Interaction::Component(component) => {
            match ControlId::parse(&component.data.custom_id) {
                Some(control_id) => handle_control(ctx, data, component, control_id).await,
                None => Ok(()),
            }
        }
        Interaction::Modal(modal) => match ControlId::parse(&modal.data.custom_id) {
            Some(control_id) => handle_submit(ctx, data, modal, control_id).await,
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

async fn handle_control(
    ctx: &serenity::Context,
    data: &Data,
    component: &ComponentInteraction,
    control_id: ControlId,
) -> Result<(), Error> {
    let workflow = &data.announcements;
    let actor = component.user.id.get();
    let id = &control_id.id;

    tracing::debug!("User {} pressed {:?} on {}", actor, control_id.control, id);

    let record = match workflow.open(id, actor, Utc::now()).await {
        Ok(record) => record,
        Err(e) => {
            component.create_response(ctx, error_response(&e)).await?;
            return Ok(());
        }
    };

    match control_id.control {
        Control::Edit(payload) => {
            component
                .create_response(
                    ctx,
                    CreateInteractionResponse::Modal(view::edit_modal(&record, payload)),
                )
                .await?;
        }
        Control::TestSend => {
            // the mail server can take longer than the interaction deadline
            component
                .create_response(ctx, CreateInteractionResponse::Acknowledge)
                .await?;

            match workflow.test_send(id, actor, Utc::now()).await {
                Ok(outcome) => {
                    component
                        .edit_response(ctx, Screen::tested(&outcome).edit_response())
                        .await?;
                }
                Err(e) => after_acknowledge_error(ctx, component, &e).await?,
            }
        }
        Control::Send => {
            component
                .create_response(
                    ctx,
                    CreateInteractionResponse::UpdateMessage(
                        Screen::sending(&record).update_message(),
                    ),
                )
                .await?;

            match workflow.send(id, actor, Utc::now()).await {
                Ok(outcome) => {
                    component
                        .edit_response(ctx, Screen::sent(&outcome).edit_response())
                        .await?;
                }
                Err(e) => {
                    // put the controls back so the author can try again
                    let mut screen = Screen::draft(&record);
                    screen.notice = Some(format!("🔥 {}", e.user_message()));
                    component.edit_response(ctx, screen.edit_response()).await?;
                    after_acknowledge_error(ctx, component, &e).await?;
                }
            }
        }
        Control::Cancel => {
            let screen = match workflow.cancel(id, actor, Utc::now()).await {
                Ok(()) => Screen::cancelled(),
                Err(AnnouncementError::NotFound(_)) => Screen::expired(),
                Err(e) => {
                    component.create_response(ctx, error_response(&e)).await?;
                    return Ok(());
                }
            };
            component
                .create_response(
                    ctx,
                    CreateInteractionResponse::UpdateMessage(screen.update_message()),
                )
                .await?;
        }
        Control::Submit(_) => {
            tracing::debug!("Ignoring form submit id on a button: {}", control_id.custom_id());
        }
    }

    Ok(())
}

/// Reports a failure once the interaction has already been answered.
async fn after_acknowledge_error(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    error: &AnnouncementError,
) -> Result<(), Error> {
    if let AnnouncementError::NotFound(_) = error {
        component
            .edit_response(ctx, Screen::expired().edit_response())
            .await?;
        return Ok(());
    }

    component
        .create_followup(
            ctx,
            CreateInteractionResponseFollowup::new()
                .content(format!("🔥 {}", error.user_message()))
                .ephemeral(true),
        )
        .await?;

    Ok(())
}

async fn handle_submit(
    ctx: &serenity::Context,
    data: &Data,
    modal: &ModalInteraction,
    control_id: ControlId,
) -> Result<(), Error> {
    let Control::Submit(payload) = control_id.control else {
        tracing::debug!("Ignoring button id on a form: {}", control_id.custom_id());
        return Ok(());
    };

    let values = view::modal_values(&modal.data.components);
    let Some(edit) = view::payload_edit(payload, &values) else {
        modal
            .create_response(
                ctx,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("🔥 Every field needs some text.")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    let response = match data
        .announcements
        .edit(&control_id.id, modal.user.id.get(), edit, Utc::now())
        .await
    {
        Ok(record) => {
            CreateInteractionResponse::UpdateMessage(Screen::draft(&record).update_message())
        }
        Err(e) => error_response(&e),
    };

    modal.create_response(ctx, response).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcements::record::AnnouncementId;
    use chrono::TimeZone;

    fn id() -> AnnouncementId {
        AnnouncementId::new(42, Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap())
    }

    #[test]
    fn missing_announcements_replace_the_draft_with_the_expired_screen() {
        // act
        let response = error_response(&AnnouncementError::NotFound(id()));

        // assert
        assert!(matches!(response, CreateInteractionResponse::UpdateMessage(_)));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["embeds"][0]["title"], "Announcement expired");
        assert_eq!(json["data"]["components"], serde_json::json!([]));
    }

    #[test]
    fn other_failures_are_told_only_to_the_actor() {
        // act
        let response = error_response(&AnnouncementError::Forbidden(id()));

        // assert
        assert!(matches!(response, CreateInteractionResponse::Message(_)));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["flags"], 64);
        assert_eq!(
            json["data"]["content"],
            "🔥 You can only manage your own announcements."
        );
    }
}
