//! Macro definitions for COBOL keyword and statement boilerplate.
//!
//! These callback-style macros hold the master lists of keywords and
//! statements. Each consumer module supplies its own processing macro to
//! generate the code it needs (enum definitions, lookup tables, dispatch
//! chains).
//!
//! # Adding a new keyword
//!
//! Add one line to [`for_all_keywords!`] in the `@primary` section, or to
//! `@alias` for contextual variants that share a string with a primary
//! entry and are constructed by the parser from multi-token phrases.
//!
//! # Adding a new statement
//!
//! 1. Add one line to [`for_all_statement_variants!`] with the variant name
//!    and struct type.
//! 2. Add one line to [`for_parse_dispatch!`] mapping the keyword(s) to the
//!    parse function.
//! 3. Define the struct in `ast/statements.rs` (must have `pub span: Span`).
//! 4. Write the `parse_xxx_statement()` method under `parser/`.
//!
//! The enum variant, `span()` arm, parse dispatch, and
//! `is_statement_start()` are all generated from the tables.

// ============================================================================
// Keyword definitions
// ============================================================================

/// Master keyword table.
///
/// - `@primary`: keywords that appear in the scanner lookup, the `Keyword`
///   enum, and `as_str()`. The string is both the lookup key and the
///   `as_str()` value. Every `@primary` string must be unique.
/// - `@alias`: contextual variants in the `Keyword` enum and `as_str()`
///   only, never in the scanner lookup (they share a string with a
///   `@primary` entry).
macro_rules! for_all_keywords {
    ($mac:ident) => {
        $mac! {
            @primary {
                // Divisions and sections
                Identification  => "IDENTIFICATION",
                Environment     => "ENVIRONMENT",
                Data            => "DATA",
                Procedure       => "PROCEDURE",
                Division        => "DIVISION",
                Section         => "SECTION",

                // Identification division
                ProgramId       => "PROGRAM-ID",
                Author          => "AUTHOR",
                Installation    => "INSTALLATION",
                DateWritten     => "DATE-WRITTEN",
                DateCompiled    => "DATE-COMPILED",
                Security        => "SECURITY",

                // Environment division
                Configuration   => "CONFIGURATION",
                SourceComputer  => "SOURCE-COMPUTER",
                ObjectComputer  => "OBJECT-COMPUTER",
                SpecialNames    => "SPECIAL-NAMES",
                InputOutput     => "INPUT-OUTPUT",
                FileControl     => "FILE-CONTROL",
                Select          => "SELECT",
                Assign          => "ASSIGN",
                Organization    => "ORGANIZATION",
                Sequential      => "SEQUENTIAL",
                Indexed         => "INDEXED",
                Relative        => "RELATIVE",
                AccessMode      => "ACCESS",
                Mode            => "MODE",
                Random          => "RANDOM",
                Dynamic         => "DYNAMIC",

                // Data division
                File            => "FILE",
                WorkingStorage  => "WORKING-STORAGE",
                LocalStorage    => "LOCAL-STORAGE",
                Linkage         => "LINKAGE",
                Fd              => "FD",
                Pic             => "PIC",
                Picture         => "PICTURE",
                Value           => "VALUE",
                Values          => "VALUES",
                Redefines       => "REDEFINES",
                Occurs          => "OCCURS",
                Times           => "TIMES",
                By              => "BY",
                Ascending       => "ASCENDING",
                Descending      => "DESCENDING",
                Key             => "KEY",
                Depending       => "DEPENDING",
                On              => "ON",
                Usage           => "USAGE",
                Comp            => "COMP",
                Comp3           => "COMP-3",
                Computational   => "COMPUTATIONAL",
                Computational3  => "COMPUTATIONAL-3",
                Binary          => "BINARY",
                PackedDecimal   => "PACKED-DECIMAL",
                Display         => "DISPLAY",
                Sign            => "SIGN",
                Leading         => "LEADING",
                Trailing        => "TRAILING",
                Separate        => "SEPARATE",
                Character       => "CHARACTER",
                Justified       => "JUSTIFIED",
                Just            => "JUST",
                Right           => "RIGHT",
                Blank           => "BLANK",
                When            => "WHEN",
                Filler          => "FILLER",
                Record          => "RECORD",
                Status          => "STATUS",

                // Figurative constants
                Zero            => "ZERO",
                Zeros           => "ZEROS",
                Zeroes          => "ZEROES",
                Space           => "SPACE",
                Spaces          => "SPACES",
                HighValue       => "HIGH-VALUE",
                HighValues      => "HIGH-VALUES",
                LowValue        => "LOW-VALUE",
                LowValues       => "LOW-VALUES",
                Quote           => "QUOTE",
                Quotes          => "QUOTES",
                All             => "ALL",

                // Arithmetic and assignment verbs
                Move            => "MOVE",
                To              => "TO",
                Add             => "ADD",
                Subtract        => "SUBTRACT",
                From            => "FROM",
                Multiply        => "MULTIPLY",
                Divide          => "DIVIDE",
                Into            => "INTO",
                Compute         => "COMPUTE",
                Giving          => "GIVING",
                Rounded         => "ROUNDED",
                Size            => "SIZE",
                Error           => "ERROR",
                Remainder       => "REMAINDER",

                // Control flow
                If              => "IF",
                Then            => "THEN",
                Else            => "ELSE",
                EndIf           => "END-IF",
                Evaluate        => "EVALUATE",
                Also            => "ALSO",
                Any             => "ANY",
                True            => "TRUE",
                False           => "FALSE",
                Other           => "OTHER",
                EndEvaluate     => "END-EVALUATE",
                Perform         => "PERFORM",
                Until           => "UNTIL",
                Varying         => "VARYING",
                After           => "AFTER",
                Test            => "TEST",
                Before          => "BEFORE",
                EndPerform      => "END-PERFORM",
                Go              => "GO",
                Stop            => "STOP",
                Run             => "RUN",
                Exit            => "EXIT",
                Program         => "PROGRAM",
                Continue        => "CONTINUE",
                GoBack          => "GOBACK",
                Thru            => "THRU",
                Through         => "THROUGH",
                Alter           => "ALTER",
                Proceed         => "PROCEED",

                // CALL
                Call            => "CALL",
                Using           => "USING",
                Returning       => "RETURNING",
                EndCall         => "END-CALL",

                // I/O
                Accept          => "ACCEPT",
                Open            => "OPEN",
                Input           => "INPUT",
                Output          => "OUTPUT",
                Io              => "I-O",
                Extend          => "EXTEND",
                Close           => "CLOSE",
                Read            => "READ",
                Next            => "NEXT",
                At              => "AT",
                End             => "END",
                Invalid         => "INVALID",
                EndRead         => "END-READ",
                Write           => "WRITE",
                EndWrite        => "END-WRITE",
                Advancing       => "ADVANCING",
                NoAdvancing     => "NO",

                // Sort / merge
                Sort            => "SORT",
                Merge           => "MERGE",

                // Conditions
                And             => "AND",
                Or              => "OR",
                Not             => "NOT",
                Is              => "IS",
                Are             => "ARE",
                Equal           => "EQUAL",
                Greater         => "GREATER",
                Less            => "LESS",
                Than            => "THAN",
                Numeric         => "NUMERIC",
                Alphabetic      => "ALPHABETIC",
                Positive        => "POSITIVE",
                Negative        => "NEGATIVE",

                // Scope terminators for arithmetic
                EndCompute      => "END-COMPUTE",
                EndAdd          => "END-ADD",
                EndSubtract     => "END-SUBTRACT",
                EndMultiply     => "END-MULTIPLY",
                EndDivide       => "END-DIVIDE",
                EndProgram      => "END-PROGRAM",

                // Misc
                With            => "WITH",
                Of              => "OF",
                In              => "IN",
            }
            @alias {
                // Constructed by the parser from multi-token phrases.
                GoTo            => "GO",
                OnSizeError     => "SIZE",
                AtEnd           => "END",
                FileStatus      => "FILE",
                RecordKey       => "RECORD",
            }
        }
    };
}

// ============================================================================
// Statement definitions
// ============================================================================

/// Master statement variant table, defining the `Statement` enum.
///
/// Each entry is `Variant(StructType)`. The struct must have
/// `pub span: Span`. Generates the enum and its `span()` method.
macro_rules! for_all_statement_variants {
    ($mac:ident) => {
        $mac! {
            Move(MoveStatement),
            Compute(ComputeStatement),
            Add(AddStatement),
            Subtract(SubtractStatement),
            Multiply(MultiplyStatement),
            Divide(DivideStatement),
            If(IfStatement),
            Evaluate(EvaluateStatement),
            Perform(PerformStatement),
            GoTo(GoToStatement),
            GoBack(GoBackStatement),
            StopRun(StopRunStatement),
            Exit(ExitStatement),
            Continue(ContinueStatement),
            Display(DisplayStatement),
            Accept(AcceptStatement),
            Open(OpenStatement),
            Close(CloseStatement),
            Read(ReadStatement),
            Write(WriteStatement),
            Call(CallStatement),
            Alter(AlterStatement),
            Sort(SortStatement),
            Merge(MergeStatement),
            Unknown(UnknownStatement),
        }
    };
}

/// Statement parse dispatch table mapping keywords to parse functions.
///
/// Multiple keywords can map to one function (`Go` and `GoTo` both reach
/// `parse_goto_statement`). Generates the `parse_statement()` dispatch and
/// the `is_statement_start()` predicate.
macro_rules! for_parse_dispatch {
    ($mac:ident) => {
        $mac! {
            Move        => parse_move_statement,
            Compute     => parse_compute_statement,
            Add         => parse_add_statement,
            Subtract    => parse_subtract_statement,
            Multiply    => parse_multiply_statement,
            Divide      => parse_divide_statement,
            If          => parse_if_statement,
            Evaluate    => parse_evaluate_statement,
            Perform     => parse_perform_statement,
            Go          => parse_goto_statement,
            GoBack      => parse_goback_statement,
            Stop        => parse_stop_statement,
            Exit        => parse_exit_statement,
            Continue    => parse_continue_statement,
            Display     => parse_display_statement,
            Accept      => parse_accept_statement,
            Open        => parse_open_statement,
            Close       => parse_close_statement,
            Read        => parse_read_statement,
            Write       => parse_write_statement,
            Call        => parse_call_statement,
            Alter       => parse_alter_statement,
            Sort        => parse_sort_statement,
            Merge       => parse_merge_statement,
        }
    };
}
