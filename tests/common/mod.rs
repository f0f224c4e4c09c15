#![allow(dead_code)]

use tfscope::catalog::{Catalog, DatasetCatalogItem, SupplementalDatasetConfig};
use tfscope::engine::SqliteEngine;

const FIXTURE: &str = "
    create table harbison_meta (sample_id integer, regulator text, condition text, temperature real);
    insert into harbison_meta values
        (1, 'GAL4', 'YPD', 30.0),
        (2, 'GAL4', 'SM', 30.0),
        (3, 'MSN2', 'YPD', 37.0),
        (4, 'HSF1', 'YPD', 37.0),
        (5, 'CBF1', 'SM', 25.0);

    create table harbison (regulator text, target_locus_tag text, effect real, sample_id integer);
    insert into harbison values
        ('GAL4', 'YAL001', 1.0, 1),
        ('GAL4', 'YAL002', 2.0, 1),
        ('GAL4', 'YAL003', 3.0, 1),
        ('GAL4', 'YAL001', 1.5, 2),
        ('MSN2', 'YAL001', 2.0, 3),
        ('MSN2', 'YAL002', 4.0, 3),
        ('MSN2', 'YAL003', 6.0, 3),
        ('HSF1', 'YAL001', 0.5, 4),
        ('CBF1', 'YAL001', null, 5);

    create table kemmeren_meta (sample_id integer, regulator_symbol text, growth text);
    insert into kemmeren_meta values
        (10, 'GAL4', 'fast'),
        (11, 'MSN2', 'slow'),
        (12, 'SKN7', 'slow');

    create table kemmeren (regulator_symbol text, target_locus_tag text, log_fold real, sample_id integer);
    insert into kemmeren values
        ('GAL4', 'YAL001', 0.1, 10),
        ('MSN2', 'YBR100', -0.4, 11),
        ('SKN7', 'YBR100', 0.9, 12);

    create table degron_meta (sra_accession text, strain text);
    insert into degron_meta values ('SRR1', 'WT'), ('SRR2', 'mut'), ('SRR3', 'mut');

    create table degron_regmeta (sra_accession text, regulator_locus_tag text);
    insert into degron_regmeta values
        ('SRR1', 'YBR049C'),
        ('SRR2', 'YDR146C'),
        ('SRR3', 'YDR146C'),
        ('SRR4', 'YKL109W');

    create table degron (sra_accession text, target_locus_tag text, counts integer);
    insert into degron values ('SRR1', 'YAL001', 12), ('SRR2', 'YAL001', 40);

    create table orphan_meta (sample_id integer, batch text);
    insert into orphan_meta values (1, 'b1');

    create table wide_meta (id integer, label text, flag text, score real);
    with recursive counter(x) as (select 1 union all select x + 1 from counter where x < 150)
        insert into wide_meta (id, label, flag, score)
        select x, 'v' || x, case when x % 2 = 0 then 'even' else 'odd' end, null from counter;
";

/// In-memory engine with two plain datasets, one dataset whose regulators
/// live in a supplemental table, and a few odd metadata tables.
pub fn engine() -> SqliteEngine {
    let engine = SqliteEngine::open_in_memory().expect("in-memory engine");
    engine.execute_batch(FIXTURE).expect("fixture loads");
    engine
}

/// Catalog matching the fixture. `ghost` is configured but has no tables.
pub fn catalog() -> Catalog {
    Catalog::new(vec![
        DatasetCatalogItem::new(
            "harbison",
            "Harbison 2004",
            "BrentLab/harbison_2004",
            "harbison_2004",
            "harbison",
        ),
        DatasetCatalogItem::new(
            "kemmeren",
            "Kemmeren 2014",
            "BrentLab/kemmeren_2014",
            "kemmeren_2014",
            "kemmeren",
        ),
        DatasetCatalogItem::new(
            "degron",
            "Degron Counts",
            "BrentLab/mahendrawada_2025",
            "degron_counts",
            "degron",
        )
        .with_sample_id_field("sra_accession")
        .with_supplemental(
            SupplementalDatasetConfig::new("degron_counts_meta", "degron_regmeta")
                .with_sample_id_field("sra_accession"),
        ),
        DatasetCatalogItem::new(
            "ghost",
            "Ghost",
            "BrentLab/ghost",
            "ghost",
            "ghost",
        )
        .with_supplemental(SupplementalDatasetConfig::new("ghost_extra", "ghost_regmeta")),
    ])
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
