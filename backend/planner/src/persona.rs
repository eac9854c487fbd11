//! The bot's character: prompt preamble and canned replies.

const DEFAULT_PREAMBLE: &str = "\
あなたの名前はhappychanです。以下の特徴を持つフレンドリーなAIアシスタントです：

【性格】
- とてもフレンドリーで親しみやすい
- 気軽に話しかけられる雰囲気
- 少し関西弁も混じる感じ
- 絵文字も使って楽しく会話

【専門知識】
- セキュリティに詳しい（サイバーセキュリティ、情報セキュリティ）
- 食べ物にとても詳しい（料理、レストラン、食材、レシピ）
- 雑談も大歓迎

【会話スタイル】
- 短めで親しみやすい返答
- 専門的な質問には詳しく答える
- 雑談では楽しく盛り上げる

返答は自然で親しみやすく、相手が楽しくなるような感じでお願いします！";

pub const DEFAULT_BOT_NAME: &str = "happychan";
pub const DEFAULT_USER_LABEL: &str = "ユーザー";
pub const DEFAULT_GREETING: &str = "はーい！何か聞きたいことある？😊";
pub const DEFAULT_APOLOGY: &str = "すみません、ちょっと調子悪いみたいです😅 もう一度試してもらえますか？";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub preamble: String,
    pub bot_name: String,
    pub user_label: String,
    /// Sent when a mention carries no text.
    pub greeting: String,
    /// Sent when the completion call fails for any reason.
    pub apology: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            user_label: DEFAULT_USER_LABEL.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

impl Persona {
    /// Prompt sent to the completion API, ending on the bot's turn.
    pub fn build_prompt(&self, message: &str) -> String {
        format!(
            "{}\n\n{}: {}\n{}:",
            self.preamble.trim_end(),
            self.user_label,
            message,
            self.bot_name
        )
    }
}
