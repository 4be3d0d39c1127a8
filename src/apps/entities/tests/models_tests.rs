//! Entity hierarchy tests

use rstest::rstest;

use crate::apps::entities::{Division, Domain, Entity, LOCALITY_DIVISION_INDEX, NewEntity};
use crate::test_utils::*;

async fn division(ctx: &TestContext, index: i64) -> Division {
	let domain = Domain::create(ctx.db(), "Israel").await.unwrap();
	Division::create(ctx.db(), &domain, &format!("level {}", index), index)
		.await
		.unwrap()
}

fn new_entity(name: &str, division: &Division, parent: Option<&Entity>) -> NewEntity {
	NewEntity {
		name: name.to_string(),
		division_id: division.id,
		parent_id: parent.map(|p| p.id),
	}
}

#[rstest]
#[tokio::test]
async fn test_slug_keeps_unicode_and_deduplicates(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let div = division(&ctx, LOCALITY_DIVISION_INDEX).await;

	let first = Entity::create(ctx.db(), new_entity("תל אביב", &div, None)).await.unwrap();
	let second = Entity::create(ctx.db(), new_entity("תל אביב", &div, None)).await.unwrap();
	let symbols = Entity::create(ctx.db(), new_entity("!!!", &div, None)).await.unwrap();

	assert_eq!(first.slug, "תל-אביב");
	assert_eq!(second.slug, "תל-אביב-2");
	assert_eq!(symbols.slug, "entity");
	assert_eq!(
		Entity::get_by_slug(ctx.db(), "תל-אביב-2").await.unwrap(),
		Some(second)
	);
}

#[rstest]
#[tokio::test]
async fn test_localities_only_lists_locality_level(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let district = division(&ctx, 2).await;
	let city = division(&ctx, LOCALITY_DIVISION_INDEX).await;

	let center = Entity::create(ctx.db(), new_entity("Center", &district, None)).await.unwrap();
	let haifa = Entity::create(ctx.db(), new_entity("Haifa", &city, None)).await.unwrap();
	let acre = Entity::create(ctx.db(), new_entity("Acre", &city, Some(&center))).await.unwrap();

	let localities = Entity::localities(ctx.db()).await.unwrap();
	assert_eq!(localities, vec![acre, haifa]);
	assert!(city.is_locality());
	assert!(!district.is_locality());
	assert_eq!(Entity::all(ctx.db()).await.unwrap().len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_ancestors_and_children(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let div = division(&ctx, 1).await;

	let country = Entity::create(ctx.db(), new_entity("Country", &div, None)).await.unwrap();
	let district = Entity::create(ctx.db(), new_entity("District", &div, Some(&country))).await.unwrap();
	let city = Entity::create(ctx.db(), new_entity("City", &div, Some(&district))).await.unwrap();

	let ancestors = city.ancestors(ctx.db()).await.unwrap();
	assert_eq!(ancestors, vec![country.clone(), district.clone()]);
	assert!(country.ancestors(ctx.db()).await.unwrap().is_empty());
	assert_eq!(country.children(ctx.db()).await.unwrap(), vec![district]);
	assert_eq!(city.division(ctx.db()).await.unwrap().map(|d| d.id), Some(div.id));
}

#[rstest]
#[tokio::test]
async fn test_absolute_url_is_candidate_list(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let locality = create_locality(ctx.db(), "Haifa").await;

	assert_eq!(locality.get_absolute_url().unwrap(), "/candidates/haifa/");
}
