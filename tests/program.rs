use pretty_assertions::assert_eq;
use sicxe_asm::{AsmConfig, AsmError, Assembler, InstTable};

const COPY: &str = "\
COPY\tSTART\t0\tcopy file from input to output
\tEXTDEF\tBUFFER,BUFEND,LENGTH
\tEXTREF\tRDREC,WRREC
FIRST\tSTL\tRETADR
CLOOP\t+JSUB\tRDREC
\tLDA\tLENGTH
\tCOMP\t#0
\tJEQ\tENDFIL
\t+JSUB\tWRREC
\tJ\tCLOOP
ENDFIL\tLDA\t=C'EOF'
\tSTA\tBUFFER
\tLDA\t#3
\tSTA\tLENGTH
\t+JSUB\tWRREC
\tJ\t@RETADR
RETADR\tRESW\t1
LENGTH\tRESW\t1
\tLTORG
BUFFER\tRESB\t4096
BUFEND\tEQU\t*
MAXLEN\tEQU\tBUFEND-BUFFER
.
.\tsubroutine to read record into buffer
.
RDREC\tCSECT
\tEXTREF\tBUFFER,LENGTH,BUFEND
\tCLEAR\tX
\tCLEAR\tA
\tCLEAR\tS
\tLDT\tMAXLEN
RLOOP\tTD\tINPUT
\tJEQ\tRLOOP
\tRD\tINPUT
\tCOMPR\tA,S
\tJEQ\tEXIT
\t+STCH\tBUFFER,X
\tTIXR\tT
\tJLT\tRLOOP
EXIT\t+STX\tLENGTH
\tRSUB
INPUT\tBYTE\tX'F1'
MAXLEN\tWORD\tBUFEND-BUFFER
.
.\tsubroutine to write record from buffer
.
WRREC\tCSECT
\tEXTREF\tLENGTH,BUFFER
\tCLEAR\tX
\t+LDT\tLENGTH
WLOOP\tTD\t=X'05'
\tJEQ\tWLOOP
\t+LDCH\tBUFFER,X
\tWD\t=X'05'
\tTIXR\tT
\tJLT\tWLOOP
\tRSUB
\tEND\tFIRST
";

const EXPECTED: &str = "\
HCOPY  000000001033
DBUFFER000033BUFEND001033LENGTH00002D
RRDREC WRREC 
T0000001D1720274B1000000320232900003320074B1000003F2FEC0320160F2016
T00001D0D0100030F200A4B1000003E2000
T00003003454F46
M00000405+RDREC
M00001105+WRREC
M00002405+WRREC
E000000

HRDREC 00000000002B
RBUFFERLENGTHBUFEND
T0000001DB410B400B44077201FE3201B332FFADB2015A00433200957900000B850
T00001D0E3B2FE9131000004F0000F1000000
M00001805+BUFFER
M00002105+LENGTH
M00002806+BUFEND
M00002806-BUFFER
E

HWRREC 00000000001C
RLENGTHBUFFER
T0000001CB41077100000E32012332FFA53900000DF2008B8503B2FEE4F000005
M00000305+LENGTH
M00000D05+BUFFER
E

";

#[test]
fn assembles_three_control_sections() {
    let mut asm = Assembler::sicxe();
    let out = asm.assemble(COPY).unwrap();
    assert_eq!(out, EXPECTED);
    assert_eq!(asm.sections_opened(), 3);
}

#[test]
fn windows_line_endings() {
    let mut asm = Assembler::sicxe();
    let out = asm.assemble(&COPY.replace('\n', "\r\n")).unwrap();
    assert_eq!(out, EXPECTED);
}

#[test]
fn sections_keep_their_own_tables() {
    let mut asm = Assembler::sicxe();
    let mut sections = asm.split(COPY).unwrap();
    for cs in &mut sections {
        asm.assemble_section(cs).unwrap();
    }
    // MAXLEN is an EQU in COPY and a WORD in RDREC
    assert_eq!(sections[0].symtab.find("MAXLEN"), Some(0x1000));
    assert_eq!(sections[1].symtab.find("MAXLEN"), Some(0x28));
    assert_eq!(sections[2].symtab.find("MAXLEN"), None);
    assert_eq!(sections[2].littab.len(), 1);
    assert!(sections[0].info.is_main);
    assert!(!sections[2].info.is_main);
}

#[test]
fn errors_carry_source_line() {
    let mut asm = Assembler::sicxe();
    let src = "P\tSTART\t0\n\tLDA\tNOWHERE\n\tEND\n";
    let err = asm.assemble(src).unwrap_err();
    assert!(matches!(err, AsmError::At { line: 2, .. }));
    assert!(matches!(err.root(), AsmError::SymbolNotFound { name } if name == "NOWHERE"));
    assert_eq!(err.to_string(), "line 2: symbol not found: NOWHERE");

    let err = asm.assemble("P\tSTART\t0\nJUNK\n").unwrap_err();
    assert!(matches!(err, AsmError::At { line: 2, .. }));
    assert!(matches!(err.root(), AsmError::Syntax(_)));
}

#[test]
fn custom_instruction_directory() {
    let iset = InstTable::from_json(
        r#"[
            {"mnemonic": "START", "format": 0, "opcode": null, "min_operands": 1, "kind": "START"},
            {"mnemonic": "END", "format": 0, "opcode": null, "kind": "END"},
            {"mnemonic": "HALT", "format": 1, "opcode": 255, "kind": "MACHINE"}
        ]"#,
    )
    .unwrap();
    let mut asm = Assembler::new(iset, AsmConfig::default());
    assert_eq!(
        asm.assemble("P\tSTART\t0\n\tHALT\n\tEND\n").unwrap(),
        "HP     000000000001\nT00000001FF\nE000000\n\n"
    );
    assert!(asm.assemble("P\tSTART\t0\n\tLDA\t#1\n").is_err());
}

#[test]
fn malformed_directory_is_a_config_error() {
    assert!(matches!(
        InstTable::from_json("[{\"mnemonic\": 3}]"),
        Err(AsmError::Config(_))
    ));
}
