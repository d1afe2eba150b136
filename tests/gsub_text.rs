mod common;

use fontgraft::error::SessionError;
use fontgraft::session::{FontSession, GlyphRequest, SessionOptions};
use serde_json::json;

use common::writer;

const LIGA_TABLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ttFont sfntVersion="OTTO" ttLibVersion="4.56">
  <GSUB>
    <Version value="0x00010000"/>
    <ScriptList>
      <!-- ScriptCount=1 -->
      <ScriptRecord index="0">
        <ScriptTag value="latn"/>
        <Script>
          <DefaultLangSys>
            <ReqFeatureIndex value="65535"/>
            <!-- FeatureCount=2 -->
            <FeatureIndex index="0" value="0"/>
            <FeatureIndex index="1" value="1"/>
          </DefaultLangSys>
          <!-- LangSysCount=1 -->
          <LangSysRecord index="0">
            <LangSysTag value="TRK "/>
            <LangSys>
              <ReqFeatureIndex value="65535"/>
              <!-- FeatureCount=1 -->
              <FeatureIndex index="0" value="1"/>
            </LangSys>
          </LangSysRecord>
        </Script>
      </ScriptRecord>
    </ScriptList>
    <FeatureList>
      <!-- FeatureCount=2 -->
      <FeatureRecord index="0">
        <FeatureTag value="liga"/>
        <Feature>
          <!-- LookupCount=1 -->
          <LookupListIndex index="0" value="0"/>
        </Feature>
      </FeatureRecord>
      <FeatureRecord index="1">
        <FeatureTag value="salt"/>
        <Feature>
          <!-- LookupCount=1 -->
          <LookupListIndex index="0" value="1"/>
        </Feature>
      </FeatureRecord>
    </FeatureList>
    <LookupList>
      <!-- LookupCount=2 -->
      <Lookup index="0">
        <LookupType value="4"/>
        <LookupFlag value="0"/>
        <!-- SubTableCount=1 -->
        <LigatureSubst index="0">
          <LigatureSet glyph="f">
            <Ligature components="i" glyph="f_i"/>
            <Ligature components="l" glyph="f_l"/>
          </LigatureSet>
        </LigatureSubst>
      </Lookup>
      <Lookup index="1">
        <LookupType value="3"/>
        <LookupFlag value="8"/><!-- ignoreMarks -->
        <!-- SubTableCount=1 -->
        <AlternateSubst index="0">
          <AlternateSet glyph="a">
            <Alternate glyph="a.alt"/>
            <Alternate glyph="glyph8"/>
          </AlternateSet>
        </AlternateSubst>
      </Lookup>
    </LookupList>
  </GSUB>
</ttFont>
"#;

fn open(data: &[u8]) -> FontSession {
    FontSession::open(data, SessionOptions::default()).unwrap()
}

#[test]
fn font_without_gsub_gives_empty_table() {
    let session = open(&writer::name_keyed_otf(&["A"]));
    let text = session.gsub_text().unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(text.contains("<ttFont sfntVersion=\"OTTO\" ttLibVersion=\"4.56\">"));
    assert!(text.contains("<ScriptTag value=\"DFLT\"/>"));
    assert!(text.contains("<ReqFeatureIndex value=\"65535\"/>"));
    assert!(text.contains("<!-- FeatureCount=0 -->"));
    assert!(text.contains("<!-- LookupCount=0 -->"));
    assert!(!text.contains("<FeatureRecord"));
    assert!(!text.contains("<Lookup "));
}

#[test]
fn gsub_survives_save() {
    let mut session = open(&writer::name_keyed_otf(&["f", "i", "l", "a"]));
    let added = session
        .add_glyphs(
            ["f_i", "f_l", "a.alt"]
                .iter()
                .map(|name| {
                    let request: GlyphRequest = serde_json::from_value(json!({
                        "width": 500,
                        "path": [[["M", 0, 0], ["L", 10, 0], ["L", 10, 10], ["Z"]]]
                    }))
                    .unwrap();
                    (name.to_string(), request)
                })
                .collect(),
        )
        .unwrap();
    assert_eq!(added.len(), 3);

    session.set_gsub_text(LIGA_TABLE).unwrap();
    let text = session.gsub_text().unwrap();
    for expected in [
        "<ScriptTag value=\"latn\"/>",
        "<LangSysTag value=\"TRK \"/>",
        "<FeatureTag value=\"salt\"/>",
        "<LigatureSet glyph=\"f\">",
        "<Ligature components=\"l\" glyph=\"f_l\"/>",
        "<LookupFlag value=\"8\"/>",
        "<Alternate glyph=\"glyph8\"/>",
    ] {
        assert!(text.contains(expected), "missing {}", expected);
    }
    // Reading a dump back gives the same table
    session.set_gsub_text(&text).unwrap();
    assert_eq!(session.gsub_text().unwrap(), text);

    let saved = session.save().unwrap();
    let reopened = open(&saved);
    assert_eq!(reopened.gsub_text().unwrap(), text);
    // Saving again without edits gives the same table
    assert_eq!(open(&reopened.save().unwrap()).gsub_text().unwrap(), text);
}

#[test]
fn invalid_gsub_text_is_rejected() {
    let mut session = open(&writer::name_keyed_otf(&["f", "i"]));
    let before = session.gsub_text().unwrap();

    let no_lookups = r#"<GSUB>
  <Version value="0x00010000"/>
  <FeatureList>
    <FeatureRecord index="0">
      <FeatureTag value="liga"/>
      <Feature>
        <LookupListIndex index="0" value="0"/>
      </Feature>
    </FeatureRecord>
  </FeatureList>
</GSUB>"#;
    match session.set_gsub_text(no_lookups) {
        Err(SessionError::Transcode(error)) => {
            assert_eq!(error.field.as_deref(), Some("FeatureList[0].Feature"));
        }
        other => panic!("expected a transcode error, got {:?}", other),
    }

    match session.set_gsub_text("<ttFont>\n  <GSUB>\n    <Version value=\"0x00010000\">\n") {
        Err(SessionError::Transcode(error)) => assert!(error.position.is_some()),
        other => panic!("expected a transcode error, got {:?}", other),
    }

    // Unknown glyph names can't be resolved
    match session.set_gsub_text(LIGA_TABLE) {
        Err(SessionError::Transcode(error)) => {
            assert_eq!(error.field.as_deref(), Some("LookupList[0].SubTables[0]"));
        }
        other => panic!("expected a transcode error, got {:?}", other),
    }

    assert_eq!(session.gsub_text().unwrap(), before);
}
