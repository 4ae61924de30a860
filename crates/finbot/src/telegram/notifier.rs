//! Telegram delivery for intake notifications

use async_trait::async_trait;
use teloxide::prelude::*;

use fincore::core::types::Identity;
use fincore::notify::{Notification, Notifier};

use super::keyboards::actions_keyboard;

/// Sends notifications as private messages; actions become an inline keyboard.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: &Identity, notification: &Notification) -> bool {
        let Some(chat_id) = recipient.chat_id() else {
            log::warn!("Cannot deliver to non-Telegram identity {}", recipient);
            return false;
        };

        let mut request = self.bot.send_message(ChatId(chat_id), notification.text.clone());
        if !notification.actions.is_empty() {
            request = request.reply_markup(actions_keyboard(&notification.actions));
        }

        match request.await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to notify {}: {}", recipient, e);
                false
            }
        }
    }
}
