//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the store configured through `MEMBERDB_*` environment variables.
//! - Run one paging, slicing and bulk-update round trip inside a transaction
//!   that is rolled back, so file-backed stores are left untouched.

use log::info;
use memberdb_core::{
    core_version, init_logging, open_with_config, CoreConfig, Direction, Member,
    MemberRepository, PageRequest, Sort, SqliteMemberRepository, UnitOfWork,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log) = &config.log {
        init_logging(log)?;
    }
    println!("memberdb_core version={}", core_version());

    let mut conn = open_with_config(&config)?;
    let tx = conn.transaction()?;
    let uow = UnitOfWork::new();
    let members = SqliteMemberRepository::try_new(&tx, &uow)?;

    for n in 1..=5 {
        members.save(&mut Member::with_age(format!("member{n}"), 10))?;
    }
    uow.clear();

    let request = PageRequest::of_sorted(0, 3, Sort::by(Direction::Desc, "username"))?;
    let page = members.find_by_age(10, &request)?;
    println!(
        "page number={} elements={} total_elements={} total_pages={} has_next={}",
        page.number(),
        page.number_of_elements(),
        page.total_elements(),
        page.total_pages(),
        page.has_next()
    );
    for member in page.content() {
        println!("  {member}");
    }

    let slice = members.find_slice_by_age(10, &request)?;
    println!(
        "slice number={} elements={} has_next={}",
        slice.number(),
        slice.number_of_elements(),
        slice.has_next()
    );

    let updated = members.bulk_age_plus(10)?;
    println!("bulk_age_plus updated={updated}");

    tx.rollback()?;
    info!("event=cli_run module=cli status=ok updated={updated}");
    Ok(())
}
