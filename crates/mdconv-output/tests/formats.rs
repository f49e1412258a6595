//! Built-in directive documents converted end to end.

use mdconv_directives::{Capabilities, Evaluator, Registry};
use mdconv_model::{Diagnostics, Document};
use mdconv_output::{MwtabKind, MwtabWriter, TargetFormat, assemble};
use serde_json::{Value, json};

fn study_document() -> Document {
    Document::from_value(json!({
        "project": {
            "p1": {
                "title": "Liver metabolism",
                "description": "Diet effects on liver",
                "PI_last_name": "Doe",
                "PI_first_name": "Jane",
                "PI_email": "jane@example.org",
                "institution": "University"
            }
        },
        "study": {
            "st1": {
                "title": "Fat diet",
                "description": "Mice on two diets",
                "PI_last_name": "Doe",
                "PI_first_name": "Jane",
                "PI_email": "jane@example.org"
            }
        },
        "entity": {
            "m1": {"type": "subject", "subject_type": "Animal", "species": "Mus musculus", "diet": "fat"},
            "m1-liver": {
                "type": "sample",
                "parentID": "m1",
                "protocol.id": ["collect"],
                "raw_data": "m1-liver.raw"
            },
            "m2": {"type": "subject", "subject_type": "Animal", "species": "Mus musculus", "diet": "lean"},
            "m2-liver": {"type": "sample", "parentID": "m2", "protocol.id": ["collect"]}
        },
        "factor": {
            "Diet": {"field": "diet", "allowed_values": ["fat", "lean"]}
        },
        "protocol": {
            "collect": {"type": "collection", "description": "Livers were snap frozen."},
            "feed": {"type": "treatment", "description": "Mice were fed for 4 weeks."},
            "extract": {"type": "sample_prep", "description": "Polar extraction."},
            "lc": {
                "type": "chromatography",
                "chromatography_type": "Reversed phase",
                "instrument": "Vanquish",
                "column_name": "C18"
            },
            "ms": {
                "type": "MS",
                "instrument": "Orbitrap",
                "instrument_type": "Orbitrap",
                "ion_source": "ESI",
                "ion_mode": "POSITIVE"
            },
            "nmr": {
                "type": "NMR",
                "instrument": "Avance",
                "instrument_type": "FT-NMR",
                "NMR_experiment_type": "1D 1H"
            }
        }
    }))
    .unwrap()
}

fn convert(format: TargetFormat) -> Value {
    let directives = format.default_directives().unwrap().unwrap();
    let registry = Registry::from_value(&directives).unwrap();
    let document = study_document();
    let capabilities = Capabilities::default();
    let conversion =
        Evaluator::with_diagnostics(&registry, &document, &capabilities, Diagnostics::silenced())
            .unwrap()
            .run()
            .unwrap();
    assemble(&conversion.outputs, &format.layout())
}

#[test]
fn generic_format_has_no_builtin_directives() {
    assert!(TargetFormat::Generic.default_directives().unwrap().is_none());
}

#[test]
fn every_builtin_document_loads() {
    for format in [
        TargetFormat::Mwtab(MwtabKind::Ms),
        TargetFormat::Mwtab(MwtabKind::Nmr),
        TargetFormat::Isa,
    ] {
        let directives = format.default_directives().unwrap().unwrap();
        let registry = Registry::from_value(&directives).unwrap();
        assert!(!registry.is_empty(), "{format} has no directives");
    }
}

#[test]
fn nmr_variant_replaces_the_analysis_type() {
    let directives = TargetFormat::Mwtab(MwtabKind::Nmr)
        .default_directives()
        .unwrap()
        .unwrap();
    assert_eq!(directives["ANALYSIS"]["ANALYSIS_TYPE"]["override"], json!("NMR"));
    assert!(directives.get("NM").is_some());
    assert!(directives.get("CHROMATOGRAPHY").is_none());
}

#[test]
fn mwtab_ms_conversion_renders() {
    let tree = convert(TargetFormat::Mwtab(MwtabKind::Ms));
    assert_eq!(tree["PROJECT"]["PROJECT_TITLE"], json!("Liver metabolism"));
    assert_eq!(tree["SUBJECT"]["SUBJECT_SPECIES"], json!("Mus musculus"));
    assert_eq!(tree["ANALYSIS"]["ANALYSIS_TYPE"], json!("MS"));

    let rows = tree["SUBJECT_SAMPLE_FACTORS"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Subject ID"], json!("m1"));
    assert_eq!(rows[0]["Sample ID"], json!("m1-liver"));
    assert_eq!(rows[0]["Factors"], json!({"Diet": "fat"}));
    assert_eq!(rows[0]["Additional sample data"]["RAW_FILE_NAME"], json!("m1-liver.raw"));

    let text = MwtabWriter::new(MwtabKind::Ms)
        .render(tree.as_object().unwrap())
        .unwrap();
    assert!(text.starts_with(
        "#METABOLOMICS WORKBENCH STUDY_ID:ST000000 ANALYSIS_ID:AN000000 PROJECT_ID:PR000000\n"
    ));
    assert!(text.contains("\nCH:COLUMN_NAME"));
    assert!(text.contains("\tC18\n"));
    assert!(text.contains("\tm1\tm1-liver\tDiet:fat\t"));
    assert!(text.ends_with("#END\n"));
}

#[test]
fn mwtab_nmr_conversion_validates() {
    let tree = convert(TargetFormat::Mwtab(MwtabKind::Nmr));
    assert_eq!(tree["NM"]["NMR_EXPERIMENT_TYPE"], json!("1D 1H"));
    MwtabWriter::new(MwtabKind::Nmr)
        .validate(tree.as_object().unwrap())
        .unwrap();
}

#[test]
fn isa_conversion_links_samples_to_sources() {
    let tree = convert(TargetFormat::Isa);
    assert_eq!(tree["identifier"], json!("p1"));
    assert_eq!(tree["submissionDate"], json!(""));

    let study = &tree["studies"][0];
    assert_eq!(study["@id"], json!("#study/st1"));
    assert_eq!(study["factors"][0]["factorName"], json!("Diet"));
    assert_eq!(
        study["factors"][0]["factorType"],
        json!({"annotationValue": "diet", "termSource": "", "termAccession": ""})
    );
    assert_eq!(study["protocols"].as_array().unwrap().len(), 6);

    let materials = &study["materials"];
    assert_eq!(materials["sources"][1]["@id"], json!("#source/m2"));
    assert_eq!(materials["samples"][0]["name"], json!("m1-liver"));
    assert_eq!(
        materials["samples"][0]["derivesFrom"],
        json!([{"@id": "#subject/m1"}])
    );
}
