use shared::EmotionLabel;

/// Hand-tuned Spotify search keywords per emotion.
pub fn query_for(emotion: EmotionLabel) -> &'static str {
    match emotion {
        EmotionLabel::Happy => "happy upbeat energetic pop dance",
        EmotionLabel::Sad => "sad melancholy acoustic slow ballad",
        EmotionLabel::Angry => "rock metal aggressive intense",
        EmotionLabel::Surprised => "electronic uplifting dance energetic",
        EmotionLabel::Neutral => "chill relaxing ambient indie",
        EmotionLabel::Fearful => "calming soothing gentle soft",
        EmotionLabel::Disgusted => "alternative indie fresh clean",
    }
}
