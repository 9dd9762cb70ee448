//! Python target templates.
//!
//! The runtime helpers mirror COBOL storage semantics: `_conform`
//! quantizes fixed-point results (truncating toward zero, or rounding
//! half away from zero under ROUNDED) and drops high-order digits the
//! way a too-small picture would, `_move_str` pads and truncates
//! alphanumeric moves, and `_CobolFile` wraps line-sequential files.

use super::TargetTemplates;

pub const TEMPLATES: TargetTemplates = TargetTemplates {
    header: r#""""{source_name}, transpiled from COBOL.

Generated mechanically. Edit the source program, not this file.
"""
from dataclasses import dataclass, field, fields, is_dataclass
from decimal import Decimal, ROUND_DOWN, ROUND_HALF_UP
"#,
    helpers: r#"
class _SizeError(Exception):
    """A conformed result cannot hold its integer digits."""


class _CobolFile:
    def __init__(self, assign_to):
        self.assign_to = assign_to
        self.handle = None

    def open(self, mode):
        self.handle = open(self.assign_to, mode)

    def read_line(self):
        line = self.handle.readline()
        if line == "":
            return None
        return line.rstrip("\n")

    def write_line(self, text):
        self.handle.write(text + "\n")

    def close(self):
        if self.handle is not None:
            self.handle.close()
            self.handle = None


def _num(value):
    if isinstance(value, Decimal):
        return value
    text = str(value).strip()
    return Decimal(text or "0")


def _div(left, right):
    return _num(left) / _num(right)


def _conform(value, digits, scale, rounded=False, check=False):
    quantum = Decimal(1).scaleb(-scale)
    mode = ROUND_HALF_UP if rounded else ROUND_DOWN
    result = _num(value).quantize(quantum, rounding=mode)
    limit = Decimal(10) ** (digits - scale)
    if abs(result) >= limit:
        if check:
            raise _SizeError()
        result = result % limit if result >= 0 else -(-result % limit)
    if scale == 0:
        return int(result)
    return result


def _render(value):
    if isinstance(value, str):
        return value
    if is_dataclass(value):
        return "".join(_render(getattr(value, f.name)) for f in fields(value))
    if isinstance(value, list):
        return "".join(_render(item) for item in value)
    return str(value)


def _move_str(value, length):
    return _render(value)[:length].ljust(length)


def _sub(value):
    return int(_num(value)) - 1


def _is_numeric(value):
    text = _render(value).strip()
    if text.startswith(("+", "-")):
        text = text[1:]
    return text.replace(".", "", 1).isdigit()


def _is_alphabetic(value):
    text = _render(value)
    return all(c.isalpha() or c == " " for c in text)


def _call_external(name, *args):
    raise NotImplementedError("external program: " + _render(name))
"#,
    dispatch_driver: r#"
def main():
    target = "{entry}"
    while target is not None and target != "$STOP":
        target = _DISPATCH[target]()


if __name__ == "__main__":
    main()
"#,
    simple_main: r#"
def main():
    {entry}()


if __name__ == "__main__":
    main()
"#,
};
