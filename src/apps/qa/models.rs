//! Questions, answers, tags and flags.

use chrono::{DateTime, Utc};
use oshot_web::utils::slugify;
use oshot_web::{Result, ReverseError, reverse};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::db::Db;

const QUESTION_COLUMNS: &str = "q.id, q.author_id, q.entity_id, q.subject, q.content, q.unislug, q.rating, \
	 q.created_at, q.updated_at";

/// Question columns plus what list pages show next to them.
const SUMMARY_SELECT: &str = "SELECT q.id, q.author_id, q.entity_id, q.subject, q.content, q.unislug, q.rating, \
	 q.created_at, q.updated_at, u.username AS author, e.name AS entity_name, e.slug AS entity_slug, \
	 (SELECT COUNT(*) FROM answers a WHERE a.question_id = q.id) AS answer_count \
	 FROM questions q JOIN users u ON u.id = q.author_id JOIN entities e ON e.id = q.entity_id";

/// Orderings offered on list pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOrder {
	Rating,
	Date,
	Updated,
}

impl QuestionOrder {
	pub const ORDER_OPTIONS: [QuestionOrder; 3] = [QuestionOrder::Rating, QuestionOrder::Date, QuestionOrder::Updated];

	/// Parse the `order` query parameter; anything unknown sorts by rating.
	pub fn from_param(param: Option<&str>) -> Self {
		Self::ORDER_OPTIONS
			.into_iter()
			.find(|order| Some(order.as_str()) == param)
			.unwrap_or(Self::Rating)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Rating => "rating",
			Self::Date => "date",
			Self::Updated => "updated",
		}
	}

	fn order_by(self) -> &'static str {
		match self {
			Self::Rating => "q.rating DESC, q.id DESC",
			Self::Date => "q.created_at DESC, q.id DESC",
			Self::Updated => "q.updated_at DESC, q.id DESC",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Question {
	pub id: i64,
	pub author_id: i64,
	pub entity_id: i64,
	pub subject: String,
	pub content: String,
	pub unislug: String,
	pub rating: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewQuestion {
	pub author_id: i64,
	pub entity_id: i64,
	pub subject: String,
	pub content: String,
	pub tags: Vec<String>,
}

/// A question as list pages show it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuestionSummary {
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub question: Question,
	pub author: String,
	pub entity_name: String,
	pub entity_slug: String,
	pub answer_count: i64,
}

/// Slug identifying a question subject within its entity.
pub fn unislug(subject: &str) -> String {
	slugify(subject, true)
}

/// Split a comma separated tag field, dropping blanks and repeats.
///
/// # Examples
///
/// ```
/// use oshot::apps::qa::models::parse_tags;
///
/// assert_eq!(parse_tags("schools, roads,,Schools "), vec!["schools", "roads", "Schools"]);
/// ```
pub fn parse_tags(raw: &str) -> Vec<String> {
	let mut tags: Vec<String> = Vec::new();
	for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
		if !tags.iter().any(|t| t == tag) {
			tags.push(tag.to_string());
		}
	}
	tags
}

impl Question {
	pub async fn create(pool: &SqlitePool, new: NewQuestion) -> Result<Self> {
		let now = Utc::now();
		let question = sqlx::query_as::<_, Question>(
			"INSERT INTO questions (author_id, entity_id, subject, content, unislug, search_text, rating, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
			RETURNING id, author_id, entity_id, subject, content, unislug, rating, created_at, updated_at",
		)
		.bind(new.author_id)
		.bind(new.entity_id)
		.bind(&new.subject)
		.bind(&new.content)
		.bind(unislug(&new.subject))
		.bind(search_text(&new.subject, &new.content))
		.bind(now)
		.bind(now)
		.fetch_one(pool)
		.await?;

		for name in &new.tags {
			let tag = Tag::get_or_create(pool, name).await?;
			sqlx::query("INSERT OR IGNORE INTO question_tags (question_id, tag_id) VALUES (?, ?)")
				.bind(question.id)
				.bind(tag.id)
				.execute(pool)
				.await?;
		}

		tracing::info!(question = question.id, entity = question.entity_id, "question created");
		Ok(question)
	}

	pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Self>> {
		let question = sqlx::query_as::<_, Question>(&format!("SELECT {} FROM questions q WHERE q.id = ?", QUESTION_COLUMNS))
			.bind(id)
			.fetch_optional(pool)
			.await?;
		Ok(question)
	}

	pub async fn all_ordered(pool: &SqlitePool, order: QuestionOrder) -> Result<Vec<QuestionSummary>> {
		let questions = sqlx::query_as::<_, QuestionSummary>(&format!("{} ORDER BY {}", SUMMARY_SELECT, order.order_by()))
			.fetch_all(pool)
			.await?;
		Ok(questions)
	}

	pub async fn for_entity(pool: &SqlitePool, entity_id: i64, order: QuestionOrder) -> Result<Vec<QuestionSummary>> {
		let questions = sqlx::query_as::<_, QuestionSummary>(&format!(
			"{} WHERE q.entity_id = ? ORDER BY {}",
			SUMMARY_SELECT,
			order.order_by()
		))
		.bind(entity_id)
		.fetch_all(pool)
		.await?;
		Ok(questions)
	}

	pub async fn by_author(pool: &SqlitePool, author_id: i64) -> Result<Vec<QuestionSummary>> {
		let questions = sqlx::query_as::<_, QuestionSummary>(&format!(
			"{} WHERE q.author_id = ? ORDER BY {}",
			SUMMARY_SELECT,
			QuestionOrder::Date.order_by()
		))
		.bind(author_id)
		.fetch_all(pool)
		.await?;
		Ok(questions)
	}

	/// Questions whose subject or content contains `query`, ignoring case.
	///
	/// A blank query matches nothing.
	pub async fn search(pool: &SqlitePool, entity_id: Option<i64>, query: &str) -> Result<Vec<QuestionSummary>> {
		let query = query.trim();
		if query.is_empty() {
			return Ok(Vec::new());
		}
		let pattern = format!("%{}%", escape_like(&query.to_lowercase()));

		let mut sql = format!("{} WHERE q.search_text LIKE ? ESCAPE '\\'", SUMMARY_SELECT);
		if entity_id.is_some() {
			sql.push_str(" AND q.entity_id = ?");
		}
		sql.push_str(" ORDER BY ");
		sql.push_str(QuestionOrder::Rating.order_by());

		let mut search = sqlx::query_as::<_, QuestionSummary>(&sql).bind(&pattern);
		if let Some(id) = entity_id {
			search = search.bind(id);
		}
		Ok(search.fetch_all(pool).await?)
	}

	pub async fn exists_with_unislug(pool: &SqlitePool, entity_id: i64, unislug: &str) -> Result<bool> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE entity_id = ? AND unislug = ?")
			.bind(entity_id)
			.bind(unislug)
			.fetch_one(pool)
			.await?;
		Ok(count > 0)
	}

	/// Answers, oldest first.
	pub async fn answers(&self, pool: &SqlitePool) -> Result<Vec<AnswerSummary>> {
		let answers = sqlx::query_as::<_, AnswerSummary>(&format!(
			"{} WHERE a.question_id = ? ORDER BY a.created_at, a.id",
			ANSWER_SUMMARY_SELECT
		))
		.bind(self.id)
		.fetch_all(pool)
		.await?;
		Ok(answers)
	}

	pub async fn tags(&self, pool: &SqlitePool) -> Result<Vec<Tag>> {
		let tags = sqlx::query_as::<_, Tag>(
			"SELECT t.id, t.name, t.slug FROM tags t JOIN question_tags qt ON qt.tag_id = t.id
			WHERE qt.question_id = ? ORDER BY t.name",
		)
		.bind(self.id)
		.fetch_all(pool)
		.await?;
		Ok(tags)
	}

	/// Mark the question as updated at `now`.
	pub async fn touch(&mut self, pool: &SqlitePool, now: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE questions SET updated_at = ? WHERE id = ?")
			.bind(now)
			.bind(self.id)
			.execute(pool)
			.await?;
		self.updated_at = now;
		Ok(())
	}

	/// Count one vote of `user_id`. Returns whether the vote was new.
	pub async fn upvote(&mut self, pool: &SqlitePool, user_id: i64) -> Result<bool> {
		let mut tx = pool.begin().await?;
		let inserted = sqlx::query("INSERT OR IGNORE INTO question_upvotes (question_id, user_id) VALUES (?, ?)")
			.bind(self.id)
			.bind(user_id)
			.execute(&mut *tx)
			.await?
			.rows_affected();
		if inserted == 0 {
			return Ok(false);
		}
		self.rating = sqlx::query_scalar("UPDATE questions SET rating = rating + 1 WHERE id = ? RETURNING rating")
			.bind(self.id)
			.fetch_one(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(true)
	}

	pub fn get_absolute_url(&self) -> std::result::Result<String, ReverseError> {
		reverse("question-detail", &[&self.id.to_string()])
	}
}

const ANSWER_SUMMARY_SELECT: &str = "SELECT a.id, a.author_id, a.question_id, a.content, a.rating, a.created_at, \
	 u.username AS author, q.subject AS question_subject \
	 FROM answers a JOIN users u ON u.id = a.author_id JOIN questions q ON q.id = a.question_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Answer {
	pub id: i64,
	pub author_id: i64,
	pub question_id: i64,
	pub content: String,
	pub rating: i64,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnswerSummary {
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub answer: Answer,
	pub author: String,
	pub question_subject: String,
}

impl Answer {
	/// Insert an answer and bump the question's `updated_at`.
	pub async fn create(pool: &SqlitePool, author_id: i64, question: &mut Question, content: &str) -> Result<Self> {
		let now = Utc::now();
		let answer = sqlx::query_as::<_, Answer>(
			"INSERT INTO answers (author_id, question_id, content, rating, created_at) VALUES (?, ?, ?, 0, ?)
			RETURNING id, author_id, question_id, content, rating, created_at",
		)
		.bind(author_id)
		.bind(question.id)
		.bind(content)
		.bind(now)
		.fetch_one(pool)
		.await?;
		question.touch(pool, now).await?;
		tracing::info!(answer = answer.id, question = question.id, "answer created");
		Ok(answer)
	}

	pub async fn by_author(pool: &SqlitePool, author_id: i64) -> Result<Vec<AnswerSummary>> {
		let answers = sqlx::query_as::<_, AnswerSummary>(&format!(
			"{} WHERE a.author_id = ? ORDER BY a.created_at DESC, a.id DESC",
			ANSWER_SUMMARY_SELECT
		))
		.bind(author_id)
		.fetch_all(pool)
		.await?;
		Ok(answers)
	}

	pub async fn count_by_author(pool: &SqlitePool, author_id: i64) -> Result<i64> {
		let count = sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE author_id = ?")
			.bind(author_id)
			.fetch_one(pool)
			.await?;
		Ok(count)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Tag {
	pub id: i64,
	pub name: String,
	pub slug: String,
}

impl Tag {
	/// The tag with the slug of `name`, created on first use.
	pub async fn get_or_create(pool: &SqlitePool, name: &str) -> Result<Self> {
		let name = name.trim();
		let mut slug = slugify(name, true);
		if slug.is_empty() {
			slug = name.to_lowercase();
		}
		sqlx::query("INSERT OR IGNORE INTO tags (name, slug) VALUES (?, ?)")
			.bind(name)
			.bind(&slug)
			.execute(pool)
			.await?;
		let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE slug = ?")
			.bind(&slug)
			.fetch_one(pool)
			.await?;
		Ok(tag)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct QuestionFlag {
	pub id: i64,
	pub question_id: i64,
	pub reporter_id: i64,
	pub created_at: DateTime<Utc>,
}

impl QuestionFlag {
	/// Record a flag and announce it on `question_flag_post_save`.
	///
	/// Receiver failures (say, the mail server being down) are logged and do
	/// not undo the flag.
	pub async fn create(db: &Db, question: &Question, reporter_id: i64) -> Result<Self> {
		let flag = sqlx::query_as::<_, QuestionFlag>(
			"INSERT INTO question_flags (question_id, reporter_id, created_at) VALUES (?, ?, ?)
			RETURNING id, question_id, reporter_id, created_at",
		)
		.bind(question.id)
		.bind(reporter_id)
		.bind(Utc::now())
		.fetch_one(&db.pool)
		.await?;

		tracing::info!(question = question.id, reporter = reporter_id, "question flagged");
		db.signals
			.question_flag_post_save
			.send_robust(db.post_save(flag.clone(), true))
			.await;
		Ok(flag)
	}

	pub async fn for_question(pool: &SqlitePool, question_id: i64) -> Result<Vec<Self>> {
		let flags = sqlx::query_as::<_, QuestionFlag>(
			"SELECT id, question_id, reporter_id, created_at FROM question_flags WHERE question_id = ? ORDER BY id",
		)
		.bind(question_id)
		.fetch_all(pool)
		.await?;
		Ok(flags)
	}
}

/// SQLite `lower()` only folds ASCII, so the searchable text is folded here.
fn search_text(subject: &str, content: &str) -> String {
	format!("{}\n{}", subject, content).to_lowercase()
}

fn escape_like(text: &str) -> String {
	text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
